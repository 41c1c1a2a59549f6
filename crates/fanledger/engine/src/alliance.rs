use crate::denial::{require_balance, Decision};
use chrono::{DateTime, Utc};
use fanledger_types::{Alliance, AllianceDelta, AllianceId, AllianceSnapshot, EconomyPolicy};

/// Decide an alliance switch.
///
/// Once affordable, an account may switch freely, including re-allying with
/// the participant it is already allied with. The observed open alliance is
/// carried in the delta so the commit can compare-and-swap the open slot.
pub fn check_alliance(
    policy: &EconomyPolicy,
    snapshot: &AllianceSnapshot,
    now: DateTime<Utc>,
) -> Decision<AllianceDelta> {
    require_balance(snapshot.account.balance, policy.alliance_cost)?;

    Ok(AllianceDelta {
        account_id: snapshot.account.id,
        closes: snapshot.open_alliance.as_ref().map(|a| a.alliance_id),
        opens: Alliance {
            alliance_id: AllianceId::generate(),
            account_id: snapshot.account.id,
            participant_id: snapshot.participant.id,
            started_at: now,
            ended_at: None,
        },
        cost: policy.alliance_cost,
    })
}
