//! Transaction coordinator.
//!
//! One attempt is: read a snapshot, ask the eligibility engine, commit the
//! delta. The store re-validates at write time, so a snapshot that went stale
//! in between surfaces as `Conflict`. A conflicting attempt is retried once
//! with a fresh snapshot; anything else is returned as is.

use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use fanledger_engine::{check_alliance, check_donation, check_vote, Denial};
use fanledger_storage::{
    AccountStore, ActionLogStore, CommitStore, LedgerStore, ObjectiveStore, ParticipantStore,
};
use fanledger_types::{
    calendar_day, Account, AccountId, AllianceReceipt, AllianceSnapshot, DonationReceipt,
    DonationSnapshot, EconomyPolicy, ObjectiveId, Participant, ParticipantId, VoteReceipt,
    VoteSnapshot,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts per action: the first try plus one retry after a conflict.
pub const MAX_ATTEMPTS: u32 = 2;

/// Applies point-spending actions atomically against a [`LedgerStore`].
#[derive(Clone)]
pub struct TransactionCoordinator {
    store: Arc<dyn LedgerStore>,
    policy: EconomyPolicy,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn LedgerStore>, policy: EconomyPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn policy(&self) -> &EconomyPolicy {
        &self.policy
    }

    /// Cast the daily vote of `account_id` for `participant_id`.
    pub async fn vote(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> LedgerResult<VoteReceipt> {
        self.with_retry("vote", || self.try_vote(account_id, participant_id, now))
            .await
    }

    /// Ally `account_id` with `participant_id`, closing any open alliance.
    pub async fn ally(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> LedgerResult<AllianceReceipt> {
        self.with_retry("alliance", || self.try_ally(account_id, participant_id, now))
            .await
    }

    /// Donate `amount` points from `account_id` to `objective_id`.
    pub async fn donate(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<DonationReceipt> {
        self.with_retry("donation", || {
            self.try_donate(account_id, objective_id, amount, now)
        })
        .await
    }

    async fn with_retry<T, F, Fut>(
        &self,
        action: &'static str,
        mut attempt_once: F,
    ) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once().await {
                Err(err) if err.is_conflict() && attempt < MAX_ATTEMPTS => {
                    warn!(action, attempt, error = %err, "commit lost a race, retrying with a fresh snapshot");
                    attempt += 1;
                }
                Err(err) if err.is_conflict() => {
                    warn!(action, attempt, error = %err, "commit conflict persisted after retry");
                    return Err(err);
                }
                other => return other,
            }
        }
    }

    async fn try_vote(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> LedgerResult<VoteReceipt> {
        let account = self.load_account(account_id).await?;
        let participant = self.load_participant(participant_id).await?;
        let already_voted = self
            .store
            .has_voted(account_id, participant_id, calendar_day(now))
            .await?;

        let snapshot = VoteSnapshot {
            account,
            participant,
            already_voted,
        };
        debug!(
            %account_id,
            %participant_id,
            balance = snapshot.account.balance,
            already_voted,
            "vote snapshot"
        );

        let delta = check_vote(&self.policy, &snapshot, now).map_err(|d| denied("vote", d))?;
        let receipt = self.store.commit_vote(&delta).await?;

        info!(
            vote_id = %receipt.vote.vote_id,
            %account_id,
            %participant_id,
            balance_after = receipt.balance_after,
            participant_votes = receipt.participant_votes,
            "vote committed"
        );
        Ok(receipt)
    }

    async fn try_ally(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        now: DateTime<Utc>,
    ) -> LedgerResult<AllianceReceipt> {
        let account = self.load_account(account_id).await?;
        let participant = self.load_participant(participant_id).await?;
        let open_alliance = self.store.open_alliance(account_id).await?;

        let snapshot = AllianceSnapshot {
            account,
            participant,
            open_alliance,
        };
        debug!(
            %account_id,
            %participant_id,
            balance = snapshot.account.balance,
            has_open_alliance = snapshot.open_alliance.is_some(),
            "alliance snapshot"
        );

        let delta =
            check_alliance(&self.policy, &snapshot, now).map_err(|d| denied("alliance", d))?;
        let receipt = self.store.commit_alliance(&delta).await?;

        info!(
            alliance_id = %receipt.alliance.alliance_id,
            %account_id,
            %participant_id,
            switched = receipt.closed.is_some(),
            balance_after = receipt.balance_after,
            "alliance committed"
        );
        Ok(receipt)
    }

    async fn try_donate(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> LedgerResult<DonationReceipt> {
        let account = self.load_account(account_id).await?;
        let objective = self
            .store
            .get_objective(objective_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("objective {objective_id}")))?;

        let snapshot = DonationSnapshot { account, objective };
        debug!(
            %account_id,
            %objective_id,
            amount,
            balance = snapshot.account.balance,
            accumulated = snapshot.objective.accumulated,
            "donation snapshot"
        );

        let delta = check_donation(&snapshot, amount, now).map_err(|d| denied("donation", d))?;
        let receipt = self.store.commit_donation(&delta).await?;

        info!(
            %account_id,
            %objective_id,
            amount,
            balance_after = receipt.balance_after,
            objective_accumulated = receipt.objective_accumulated,
            objective_active = receipt.objective_active,
            "donation committed"
        );
        Ok(receipt)
    }

    async fn load_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.store
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }

    async fn load_participant(&self, participant_id: ParticipantId) -> LedgerResult<Participant> {
        self.store
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("participant {participant_id}")))
    }
}

fn denied(action: &'static str, denial: Denial) -> LedgerError {
    warn!(action, code = denial.code(), reason = %denial, "action denied");
    LedgerError::from(denial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanledger_storage::memory::InMemoryLedgerStore;
    use fanledger_types::{NewObjective, NewParticipant};

    async fn setup(balance: i64) -> (TransactionCoordinator, AccountId, ParticipantId) {
        let store = Arc::new(InMemoryLedgerStore::new());
        let account = store.open_account("ana", Utc::now()).await.unwrap();
        if balance > 0 {
            store.credit_account(account.id, balance).await.unwrap();
        }
        let participant = store
            .create_participant(NewParticipant::named("Lola"))
            .await
            .unwrap();
        let coordinator = TransactionCoordinator::new(store, EconomyPolicy::default());
        (coordinator, account.id, participant.id)
    }

    #[tokio::test]
    async fn vote_debits_and_bumps_counters() {
        let (coordinator, account, participant) = setup(100).await;
        let receipt = coordinator
            .vote(account, participant, Utc::now())
            .await
            .unwrap();

        assert_eq!(receipt.balance_after, 90);
        assert_eq!(receipt.participant_votes, 1);
        assert_eq!(receipt.participant_points, 10);
    }

    #[tokio::test]
    async fn second_vote_same_day_is_a_duplicate() {
        let (coordinator, account, participant) = setup(100).await;
        let now = Utc::now();
        coordinator.vote(account, participant, now).await.unwrap();

        let err = coordinator.vote(account, participant, now).await.unwrap_err();
        assert_eq!(err.code(), "duplicate_action");

        let balance = coordinator
            .store()
            .get_account(account)
            .await
            .unwrap()
            .unwrap()
            .balance;
        assert_eq!(balance, 90);
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let (coordinator, account, participant) = setup(100).await;
        let now = Utc::now();

        let err = coordinator
            .vote(AccountId(999), participant, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = coordinator
            .ally(account, ParticipantId(999), now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));

        let err = coordinator
            .donate(account, ObjectiveId(999), 10, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn alliance_switch_closes_previous() {
        let (coordinator, account, first) = setup(200).await;
        let second = coordinator
            .store()
            .create_participant(NewParticipant::named("Pepe"))
            .await
            .unwrap()
            .id;

        let opened = coordinator.ally(account, first, Utc::now()).await.unwrap();
        assert!(opened.closed.is_none());

        let switched = coordinator.ally(account, second, Utc::now()).await.unwrap();
        assert_eq!(switched.closed, Some(opened.alliance.alliance_id));
        assert_eq!(switched.balance_after, 100);
    }

    #[tokio::test]
    async fn donation_denials_follow_check_order() {
        let (coordinator, account, participant) = setup(30).await;
        let objective = coordinator
            .store()
            .create_objective(
                NewObjective {
                    participant_id: participant,
                    title: "Gift".into(),
                    description: None,
                    threshold: 20,
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let now = Utc::now();

        let err = coordinator
            .donate(account, objective.id, 0, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(0)));

        let err = coordinator
            .donate(account, objective.id, 31, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let receipt = coordinator
            .donate(account, objective.id, 25, now)
            .await
            .unwrap();
        assert!(!receipt.objective_active);

        let err = coordinator
            .donate(account, objective.id, 5, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ObjectiveClosed(id) if id == objective.id));
    }

    #[tokio::test]
    async fn retry_helper_gives_up_after_second_conflict() {
        let (coordinator, _, _) = setup(0).await;
        let mut calls = 0;
        let result: LedgerResult<()> = coordinator
            .with_retry("test", || {
                calls += 1;
                async { Err(LedgerError::Conflict("moved".into())) }
            })
            .await;

        assert!(result.unwrap_err().is_conflict());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn retry_helper_does_not_retry_denials() {
        let (coordinator, _, _) = setup(0).await;
        let mut calls = 0;
        let result: LedgerResult<()> = coordinator
            .with_retry("test", || {
                calls += 1;
                async { Err(LedgerError::InvalidAmount(-1)) }
            })
            .await;

        assert!(matches!(result, Err(LedgerError::InvalidAmount(-1))));
        assert_eq!(calls, 1);
    }
}
