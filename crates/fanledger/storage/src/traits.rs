use crate::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fanledger_types::{
    Account, AccountId, Alliance, AllianceDelta, AllianceReceipt, Challenge, DonationDelta,
    DonationLedgerEntry, DonationObjective, DonationReceipt, NewChallenge, NewObjective,
    NewParticipant, NewVideo, ObjectiveId, Participant, ParticipantId, TopVideo, VoteDelta,
    VoteReceipt, VoteRecord,
};
use std::collections::HashMap;

/// Generic query window for paged reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryWindow {
    pub limit: usize,
    pub offset: usize,
}

/// Storage interface for point accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Open an account with a zero balance. Nicknames are unique.
    async fn open_account(
        &self,
        nickname: &str,
        opened_at: DateTime<Utc>,
    ) -> StorageResult<Account>;

    /// Credit earned points. `amount` must be positive.
    async fn credit_account(&self, account_id: AccountId, amount: i64) -> StorageResult<Account>;

    async fn get_account(&self, account_id: AccountId) -> StorageResult<Option<Account>>;
}

/// Storage interface for participants and their aggregate counters.
#[async_trait]
pub trait ParticipantStore: Send + Sync {
    async fn create_participant(&self, participant: NewParticipant) -> StorageResult<Participant>;

    async fn set_participant_removed(
        &self,
        participant_id: ParticipantId,
        removed: bool,
    ) -> StorageResult<Participant>;

    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StorageResult<Option<Participant>>;

    /// All participants in id (insertion) order.
    async fn list_participants(&self) -> StorageResult<Vec<Participant>>;
}

/// Read access to the append-only action log.
#[async_trait]
pub trait ActionLogStore: Send + Sync {
    async fn has_voted(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        day: NaiveDate,
    ) -> StorageResult<bool>;

    /// Votes cast by an account on one calendar day.
    async fn votes_on_day(
        &self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> StorageResult<Vec<VoteRecord>>;

    /// Committed vote rows per participant. Participants without votes are absent.
    async fn vote_counts(&self) -> StorageResult<HashMap<ParticipantId, i64>>;

    async fn open_alliance(&self, account_id: AccountId) -> StorageResult<Option<Alliance>>;

    /// Open alliances pointing at a participant.
    async fn open_alliance_count(&self, participant_id: ParticipantId) -> StorageResult<i64>;

    /// Alliance history of an account, newest first.
    async fn list_alliances(
        &self,
        account_id: AccountId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Alliance>>;

    async fn donation_entry(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationLedgerEntry>>;

    /// Sum of donation entry totals per objective.
    async fn donation_totals(&self) -> StorageResult<HashMap<ObjectiveId, i64>>;
}

/// Storage interface for donation objectives.
#[async_trait]
pub trait ObjectiveStore: Send + Sync {
    async fn create_objective(
        &self,
        objective: NewObjective,
        created_at: DateTime<Utc>,
    ) -> StorageResult<DonationObjective>;

    async fn get_objective(
        &self,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationObjective>>;

    /// Objectives in id order, optionally only the active ones.
    async fn list_objectives(&self, active_only: bool) -> StorageResult<Vec<DonationObjective>>;
}

/// Read-mostly participant content: top videos and challenges.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn add_video(&self, video: NewVideo) -> StorageResult<TopVideo>;
    async fn list_videos(&self, participant_id: ParticipantId) -> StorageResult<Vec<TopVideo>>;
    async fn add_challenge(&self, challenge: NewChallenge) -> StorageResult<Challenge>;

    /// Challenges newest first, for one participant or for everyone.
    async fn list_challenges(
        &self,
        participant_id: Option<ParticipantId>,
    ) -> StorageResult<Vec<Challenge>>;
}

/// Atomic commit of engine deltas.
///
/// Each method is one transaction: every field lands or none does. The store
/// re-validates against current state and answers:
/// - `Duplicate` when a uniqueness constraint rejects the log row
/// - `Conflict` when the state the delta was computed from has moved
///   (balance no longer covers the cost, open-alliance slot changed,
///   objective closed)
/// - `NotFound` when a referenced entity does not exist
#[async_trait]
pub trait CommitStore: Send + Sync {
    async fn commit_vote(&self, delta: &VoteDelta) -> StorageResult<VoteReceipt>;
    async fn commit_alliance(&self, delta: &AllianceDelta) -> StorageResult<AllianceReceipt>;
    async fn commit_donation(&self, delta: &DonationDelta) -> StorageResult<DonationReceipt>;
}

/// Unified storage bundle used by the coordinator and read models.
pub trait LedgerStore:
    AccountStore
    + ParticipantStore
    + ActionLogStore
    + ObjectiveStore
    + ContentStore
    + CommitStore
    + Send
    + Sync
{
}

impl<T> LedgerStore for T where
    T: AccountStore
        + ParticipantStore
        + ActionLogStore
        + ObjectiveStore
        + ContentStore
        + CommitStore
        + Send
        + Sync
{
}
