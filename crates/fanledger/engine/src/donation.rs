use crate::denial::{require_balance, Decision, Denial};
use chrono::{DateTime, Utc};
use fanledger_types::{DonationDelta, DonationSnapshot};

/// Decide a donation towards a collective objective.
///
/// There is no cap on `amount` beyond the donor's balance; an objective may end
/// above its threshold. An amount that would push the objective total out of
/// the `i64` range is invalid.
pub fn check_donation(
    snapshot: &DonationSnapshot,
    amount: i64,
    now: DateTime<Utc>,
) -> Decision<DonationDelta> {
    if amount <= 0 {
        return Err(Denial::InvalidAmount { amount });
    }
    require_balance(snapshot.account.balance, amount)?;
    if !snapshot.objective.active {
        return Err(Denial::ObjectiveClosed {
            objective_id: snapshot.objective.id,
        });
    }

    if snapshot.objective.accumulated.checked_add(amount).is_none() {
        return Err(Denial::InvalidAmount { amount });
    }

    Ok(DonationDelta {
        account_id: snapshot.account.id,
        objective_id: snapshot.objective.id,
        amount,
        donated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanledger_types::{Account, AccountId, DonationObjective, ObjectiveId, ParticipantId};
    use proptest::prelude::*;

    fn snapshot(balance: i64, accumulated: i64, active: bool) -> DonationSnapshot {
        DonationSnapshot {
            account: Account {
                id: AccountId(1),
                nickname: "ana".into(),
                balance,
                created_at: Utc::now(),
            },
            objective: DonationObjective {
                id: ObjectiveId(3),
                participant_id: ParticipantId(1),
                title: "Stage lights".into(),
                description: None,
                threshold: 100,
                accumulated,
                active,
                created_at: Utc::now(),
            },
        }
    }

    #[test]
    fn rejects_non_positive_amounts_first() {
        // Even on a closed objective with no balance, the amount is reported.
        let snap = snapshot(0, 100, false);
        assert_eq!(
            check_donation(&snap, 0, Utc::now()).unwrap_err(),
            Denial::InvalidAmount { amount: 0 }
        );
        assert_eq!(
            check_donation(&snap, -5, Utc::now()).unwrap_err(),
            Denial::InvalidAmount { amount: -5 }
        );
    }

    #[test]
    fn balance_checked_before_objective_state() {
        let err = check_donation(&snapshot(10, 100, false), 20, Utc::now()).unwrap_err();
        assert!(matches!(err, Denial::InsufficientBalance { .. }));
    }

    #[test]
    fn closed_objective_is_denied() {
        let err = check_donation(&snapshot(100, 120, false), 20, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            Denial::ObjectiveClosed {
                objective_id: ObjectiveId(3)
            }
        );
    }

    #[test]
    fn amount_overflowing_objective_total_is_invalid() {
        let mut snap = snapshot(10, i64::MAX - 1, true);
        snap.objective.threshold = i64::MAX;
        assert_eq!(
            check_donation(&snap, 5, Utc::now()).unwrap_err(),
            Denial::InvalidAmount { amount: 5 }
        );
        assert!(check_donation(&snap, 1, Utc::now()).is_ok());
    }

    proptest! {
        #[test]
        fn allowed_donation_never_overdraws(balance in 0i64..1_000, amount in -50i64..1_000) {
            let snap = snapshot(balance, 0, true);
            if let Ok(delta) = check_donation(&snap, amount, Utc::now()) {
                prop_assert!(delta.amount > 0);
                prop_assert!(delta.amount <= balance);
            }
        }
    }
}
