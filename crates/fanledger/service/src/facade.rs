//! Collaborator boundary of the ledger.
//!
//! Action methods never fail: every error becomes an [`ActionOutcome`] with an
//! error status. View and admin methods return [`LedgerResult`].

use crate::coordinator::TransactionCoordinator;
use crate::error::{LedgerError, LedgerResult};
use crate::queries::{self, ReconciliationReport};
use crate::views::{
    ActionOutcome, HomeView, LeaderboardRow, ObjectiveProgressRow, ParticipantDetail,
    PlaygroundView, UserStatus,
};
use chrono::{DateTime, Utc};
use fanledger_storage::memory::InMemoryLedgerStore;
use fanledger_storage::{
    AccountStore, ActionLogStore, ContentStore, LedgerStore, ObjectiveStore, ParticipantStore,
};
use fanledger_types::{
    calendar_day, Account, AccountId, Challenge, DonationObjective, EconomyPolicy, NewChallenge,
    NewObjective, NewParticipant, NewVideo, ObjectiveId, Participant, ParticipantId, TopVideo,
};
use std::sync::Arc;
use tracing::info;

/// Fan-engagement ledger: actions, views and administrative seeding.
#[derive(Clone)]
pub struct FanLedger {
    coordinator: TransactionCoordinator,
    clock: fn() -> DateTime<Utc>,
}

impl FanLedger {
    /// In-memory ledger with the default economy.
    pub fn new() -> Self {
        Self::with_storage(
            Arc::new(InMemoryLedgerStore::new()),
            EconomyPolicy::default(),
        )
    }

    pub fn with_storage(store: Arc<dyn LedgerStore>, policy: EconomyPolicy) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store, policy),
            clock: Utc::now,
        }
    }

    /// Replace the wall clock used to timestamp actions and derive "today".
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn policy(&self) -> &EconomyPolicy {
        self.coordinator.policy()
    }

    fn store(&self) -> &dyn LedgerStore {
        self.coordinator.store().as_ref()
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    // ============ Actions ============

    pub async fn submit_vote(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
    ) -> ActionOutcome {
        match self
            .coordinator
            .vote(account_id, participant_id, self.now())
            .await
        {
            Ok(receipt) => ActionOutcome::ok(format!(
                "Vote recorded. {} points left.",
                receipt.balance_after
            )),
            Err(err) => ActionOutcome::error(&err),
        }
    }

    pub async fn submit_alliance(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
    ) -> ActionOutcome {
        match self
            .coordinator
            .ally(account_id, participant_id, self.now())
            .await
        {
            Ok(receipt) if receipt.closed.is_some() => ActionOutcome::ok(format!(
                "Alliance switched. {} points left.",
                receipt.balance_after
            )),
            Ok(receipt) => ActionOutcome::ok(format!(
                "Alliance formed. {} points left.",
                receipt.balance_after
            )),
            Err(err) => ActionOutcome::error(&err),
        }
    }

    pub async fn submit_donation(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
        amount: i64,
    ) -> ActionOutcome {
        match self
            .coordinator
            .donate(account_id, objective_id, amount, self.now())
            .await
        {
            Ok(receipt) if !receipt.objective_active => ActionOutcome::ok(format!(
                "Donated {amount} points. Objective completed!"
            )),
            Ok(receipt) => ActionOutcome::ok(format!(
                "Donated {amount} points. {} points left.",
                receipt.balance_after
            )),
            Err(err) => ActionOutcome::error(&err),
        }
    }

    // ============ Views ============

    /// Alliance and daily votes of a viewer. `None` is an anonymous visitor.
    pub async fn user_status(&self, account_id: Option<AccountId>) -> LedgerResult<UserStatus> {
        let Some(account_id) = account_id else {
            return Ok(UserStatus::default());
        };
        let account = self.require_account(account_id).await?;
        let today = calendar_day(self.now());

        let alliance = self.store().open_alliance(account_id).await?;
        let voted_today = queries::user_daily_vote_index(self.store(), account_id, today).await?;

        Ok(UserStatus {
            account_id: Some(account_id),
            balance: Some(account.balance),
            is_allied: alliance.is_some(),
            allied_participant: alliance.as_ref().map(|a| a.participant_id),
            days_allied: alliance
                .as_ref()
                .map(|a| queries::days_allied(a, today))
                .unwrap_or(0),
            alliance,
            voted_today,
        })
    }

    pub async fn home_view(&self, account_id: Option<AccountId>) -> LedgerResult<HomeView> {
        let user = self.user_status(account_id).await?;
        let board = queries::leaderboard(self.store().list_participants().await?);

        let mut participants = Vec::with_capacity(board.len());
        for (index, participant) in board.iter().enumerate() {
            participants.push(LeaderboardRow {
                rank: index + 1,
                affinity: queries::affinity(participant, &board),
                alliance_count: queries::alliance_count(self.store(), participant.id).await?,
                voted_today: user.voted_today.contains(&participant.id),
                participant: participant.clone(),
            });
        }

        Ok(HomeView { user, participants })
    }

    pub async fn participant_detail(
        &self,
        participant_id: ParticipantId,
        account_id: Option<AccountId>,
    ) -> LedgerResult<ParticipantDetail> {
        let participant = self
            .store()
            .get_participant(participant_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("participant {participant_id}")))?;

        let (alliance_active, voted_today) = match account_id {
            Some(account_id) => {
                self.require_account(account_id).await?;
                let open = self.store().open_alliance(account_id).await?;
                let voted = self
                    .store()
                    .has_voted(account_id, participant_id, calendar_day(self.now()))
                    .await?;
                (
                    open.is_some_and(|a| a.participant_id == participant_id),
                    voted,
                )
            }
            None => (false, false),
        };

        Ok(ParticipantDetail {
            videos: self.store().list_videos(participant_id).await?,
            challenges: self.store().list_challenges(Some(participant_id)).await?,
            alliance_count: queries::alliance_count(self.store(), participant_id).await?,
            participant,
            alliance_active,
            voted_today,
        })
    }

    pub async fn playground_view(
        &self,
        account_id: Option<AccountId>,
    ) -> LedgerResult<PlaygroundView> {
        let user = self.user_status(account_id).await?;
        let removed_participants = self
            .store()
            .list_participants()
            .await?
            .into_iter()
            .filter(|p| p.removed)
            .collect();
        let mut objectives = Vec::new();
        for objective in self.store().list_objectives(true).await? {
            let viewer_donated = match account_id {
                Some(account_id) => self
                    .store()
                    .donation_entry(account_id, objective.id)
                    .await?
                    .map_or(0, |entry| entry.total_donated),
                None => 0,
            };
            objectives.push(ObjectiveProgressRow {
                progress: queries::objective_progress(&objective),
                viewer_donated,
                objective,
            });
        }

        Ok(PlaygroundView {
            user,
            removed_participants,
            challenges: self.store().list_challenges(None).await?,
            objectives,
        })
    }

    pub async fn reconcile(&self) -> LedgerResult<ReconciliationReport> {
        queries::reconcile(self.store(), self.policy()).await
    }

    // ============ Administration ============

    pub async fn open_account(&self, nickname: &str) -> LedgerResult<Account> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(LedgerError::InvalidInput("nickname must not be empty".into()));
        }
        let account = self.store().open_account(nickname, self.now()).await?;
        info!(account_id = %account.id, nickname, "account opened");
        Ok(account)
    }

    /// Credit points earned outside the ledger.
    pub async fn credit_points(&self, account_id: AccountId, amount: i64) -> LedgerResult<Account> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let account = self.store().credit_account(account_id, amount).await?;
        info!(%account_id, amount, balance = account.balance, "points credited");
        Ok(account)
    }

    pub async fn add_participant(&self, participant: NewParticipant) -> LedgerResult<Participant> {
        if participant.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "participant name must not be empty".into(),
            ));
        }
        Ok(self.store().create_participant(participant).await?)
    }

    pub async fn set_participant_removed(
        &self,
        participant_id: ParticipantId,
        removed: bool,
    ) -> LedgerResult<Participant> {
        let participant = self
            .store()
            .set_participant_removed(participant_id, removed)
            .await?;
        info!(%participant_id, removed, "participant removal flag set");
        Ok(participant)
    }

    pub async fn add_objective(&self, objective: NewObjective) -> LedgerResult<DonationObjective> {
        if objective.title.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "objective title must not be empty".into(),
            ));
        }
        self.require_participant(objective.participant_id).await?;
        Ok(self.store().create_objective(objective, self.now()).await?)
    }

    pub async fn add_video(&self, video: NewVideo) -> LedgerResult<TopVideo> {
        self.require_participant(video.participant_id).await?;
        Ok(self.store().add_video(video).await?)
    }

    pub async fn add_challenge(&self, challenge: NewChallenge) -> LedgerResult<Challenge> {
        self.require_participant(challenge.participant_id).await?;
        Ok(self.store().add_challenge(challenge).await?)
    }

    async fn require_account(&self, account_id: AccountId) -> LedgerResult<Account> {
        self.store()
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }

    async fn require_participant(&self, participant_id: ParticipantId) -> LedgerResult<()> {
        self.store()
            .get_participant(participant_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| LedgerError::NotFound(format!("participant {participant_id}")))
    }
}

impl Default for FanLedger {
    fn default() -> Self {
        Self::new()
    }
}
