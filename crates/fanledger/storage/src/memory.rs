//! In-memory reference implementation of the ledger store traits.
//!
//! The whole ledger sits behind one `RwLock`, so a commit validates and mutates
//! accounts, counters and log rows under a single write guard. This adapter is
//! deterministic and test-friendly. Production deployments should use a
//! transactional backend (e.g. PostgreSQL).

use crate::traits::{
    AccountStore, ActionLogStore, CommitStore, ContentStore, ObjectiveStore, ParticipantStore,
    QueryWindow,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fanledger_types::{
    Account, AccountId, Alliance, AllianceDelta, AllianceReceipt, Challenge, ChallengeId,
    DonationDelta, DonationLedgerEntry, DonationObjective, DonationReceipt, NewChallenge,
    NewObjective, NewParticipant, NewVideo, ObjectiveId, Participant, ParticipantId, TopVideo,
    VideoId, VoteDelta, VoteReceipt, VoteRecord,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    participants: BTreeMap<ParticipantId, Participant>,
    objectives: BTreeMap<ObjectiveId, DonationObjective>,
    votes: Vec<VoteRecord>,
    vote_keys: HashSet<(AccountId, ParticipantId, NaiveDate)>,
    alliances: Vec<Alliance>,
    // account -> index of its open alliance in `alliances`
    open_slots: HashMap<AccountId, usize>,
    donations: BTreeMap<(AccountId, ObjectiveId), DonationLedgerEntry>,
    videos: Vec<TopVideo>,
    challenges: Vec<Challenge>,
    serials: Serials,
}

#[derive(Default)]
struct Serials {
    account: i64,
    participant: i64,
    objective: i64,
    video: i64,
    challenge: i64,
}

fn next_serial(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

/// In-memory ledger store.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, LedgerState>> {
        self.state
            .read()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, LedgerState>> {
        self.state
            .write()
            .map_err(|_| StorageError::Backend("ledger lock poisoned".to_string()))
    }
}

#[async_trait]
impl AccountStore for InMemoryLedgerStore {
    async fn open_account(
        &self,
        nickname: &str,
        opened_at: DateTime<Utc>,
    ) -> StorageResult<Account> {
        let mut guard = self.write()?;
        if guard.accounts.values().any(|a| a.nickname == nickname) {
            return Err(StorageError::Conflict(format!(
                "nickname `{nickname}` already taken"
            )));
        }

        let account = Account {
            id: AccountId(next_serial(&mut guard.serials.account)),
            nickname: nickname.to_string(),
            balance: 0,
            created_at: opened_at,
        };
        guard.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn credit_account(&self, account_id: AccountId, amount: i64) -> StorageResult<Account> {
        if amount <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let mut guard = self.write()?;
        let account = guard
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| StorageError::NotFound(format!("account {account_id} not found")))?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StorageError::InvalidInput("balance overflow".to_string()))?;
        Ok(account.clone())
    }

    async fn get_account(&self, account_id: AccountId) -> StorageResult<Option<Account>> {
        Ok(self.read()?.accounts.get(&account_id).cloned())
    }
}

#[async_trait]
impl ParticipantStore for InMemoryLedgerStore {
    async fn create_participant(&self, participant: NewParticipant) -> StorageResult<Participant> {
        let mut guard = self.write()?;
        let record = Participant {
            id: ParticipantId(next_serial(&mut guard.serials.participant)),
            name: participant.name,
            instagram: participant.instagram,
            tiktok: participant.tiktok,
            photo: participant.photo,
            votes_received: 0,
            points_total: 0,
            removed: false,
        };
        guard.participants.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_participant_removed(
        &self,
        participant_id: ParticipantId,
        removed: bool,
    ) -> StorageResult<Participant> {
        let mut guard = self.write()?;
        let participant = guard.participants.get_mut(&participant_id).ok_or_else(|| {
            StorageError::NotFound(format!("participant {participant_id} not found"))
        })?;
        participant.removed = removed;
        Ok(participant.clone())
    }

    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StorageResult<Option<Participant>> {
        Ok(self.read()?.participants.get(&participant_id).cloned())
    }

    async fn list_participants(&self) -> StorageResult<Vec<Participant>> {
        Ok(self.read()?.participants.values().cloned().collect())
    }
}

#[async_trait]
impl ActionLogStore for InMemoryLedgerStore {
    async fn has_voted(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        day: NaiveDate,
    ) -> StorageResult<bool> {
        Ok(self
            .read()?
            .vote_keys
            .contains(&(account_id, participant_id, day)))
    }

    async fn votes_on_day(
        &self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> StorageResult<Vec<VoteRecord>> {
        Ok(self
            .read()?
            .votes
            .iter()
            .filter(|v| v.account_id == account_id && v.day == day)
            .cloned()
            .collect())
    }

    async fn vote_counts(&self) -> StorageResult<HashMap<ParticipantId, i64>> {
        let guard = self.read()?;
        let mut counts = HashMap::new();
        for vote in &guard.votes {
            *counts.entry(vote.participant_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn open_alliance(&self, account_id: AccountId) -> StorageResult<Option<Alliance>> {
        let guard = self.read()?;
        Ok(guard
            .open_slots
            .get(&account_id)
            .map(|&idx| guard.alliances[idx].clone()))
    }

    async fn open_alliance_count(&self, participant_id: ParticipantId) -> StorageResult<i64> {
        let guard = self.read()?;
        let count = guard
            .open_slots
            .values()
            .filter(|&&idx| guard.alliances[idx].participant_id == participant_id)
            .count();
        Ok(count as i64)
    }

    async fn list_alliances(
        &self,
        account_id: AccountId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Alliance>> {
        let guard = self.read()?;
        let mut values = guard
            .alliances
            .iter()
            .filter(|a| a.account_id == account_id)
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(apply_window(values, window))
    }

    async fn donation_entry(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationLedgerEntry>> {
        Ok(self
            .read()?
            .donations
            .get(&(account_id, objective_id))
            .cloned())
    }

    async fn donation_totals(&self) -> StorageResult<HashMap<ObjectiveId, i64>> {
        let guard = self.read()?;
        let mut totals = HashMap::new();
        for entry in guard.donations.values() {
            *totals.entry(entry.objective_id).or_insert(0) += entry.total_donated;
        }
        Ok(totals)
    }
}

#[async_trait]
impl ObjectiveStore for InMemoryLedgerStore {
    async fn create_objective(
        &self,
        objective: NewObjective,
        created_at: DateTime<Utc>,
    ) -> StorageResult<DonationObjective> {
        let mut guard = self.write()?;
        if !guard.participants.contains_key(&objective.participant_id) {
            return Err(StorageError::NotFound(format!(
                "participant {} not found",
                objective.participant_id
            )));
        }

        let record = DonationObjective {
            id: ObjectiveId(next_serial(&mut guard.serials.objective)),
            participant_id: objective.participant_id,
            title: objective.title,
            description: objective.description,
            threshold: objective.threshold,
            accumulated: 0,
            active: objective.threshold > 0,
            created_at,
        };
        guard.objectives.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_objective(
        &self,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationObjective>> {
        Ok(self.read()?.objectives.get(&objective_id).cloned())
    }

    async fn list_objectives(&self, active_only: bool) -> StorageResult<Vec<DonationObjective>> {
        Ok(self
            .read()?
            .objectives
            .values()
            .filter(|o| !active_only || o.active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ContentStore for InMemoryLedgerStore {
    async fn add_video(&self, video: NewVideo) -> StorageResult<TopVideo> {
        let mut guard = self.write()?;
        if !guard.participants.contains_key(&video.participant_id) {
            return Err(StorageError::NotFound(format!(
                "participant {} not found",
                video.participant_id
            )));
        }
        let record = TopVideo {
            id: VideoId(next_serial(&mut guard.serials.video)),
            participant_id: video.participant_id,
            uploaded_at: video.uploaded_at,
            url: video.url,
        };
        guard.videos.push(record.clone());
        Ok(record)
    }

    async fn list_videos(&self, participant_id: ParticipantId) -> StorageResult<Vec<TopVideo>> {
        Ok(self
            .read()?
            .videos
            .iter()
            .filter(|v| v.participant_id == participant_id)
            .cloned()
            .collect())
    }

    async fn add_challenge(&self, challenge: NewChallenge) -> StorageResult<Challenge> {
        let mut guard = self.write()?;
        if !guard.participants.contains_key(&challenge.participant_id) {
            return Err(StorageError::NotFound(format!(
                "participant {} not found",
                challenge.participant_id
            )));
        }
        let record = Challenge {
            id: ChallengeId(next_serial(&mut guard.serials.challenge)),
            participant_id: challenge.participant_id,
            posted_at: challenge.posted_at,
            text: challenge.text,
            points: challenge.points,
            completed: challenge.completed,
        };
        guard.challenges.push(record.clone());
        Ok(record)
    }

    async fn list_challenges(
        &self,
        participant_id: Option<ParticipantId>,
    ) -> StorageResult<Vec<Challenge>> {
        let guard = self.read()?;
        let mut values = guard
            .challenges
            .iter()
            .filter(|c| participant_id.map_or(true, |p| c.participant_id == p))
            .cloned()
            .collect::<Vec<_>>();
        values.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then(b.id.cmp(&a.id)));
        Ok(values)
    }
}

#[async_trait]
impl CommitStore for InMemoryLedgerStore {
    async fn commit_vote(&self, delta: &VoteDelta) -> StorageResult<VoteReceipt> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let vote = &delta.vote;

        let account = state.accounts.get_mut(&vote.account_id).ok_or_else(|| {
            StorageError::NotFound(format!("account {} not found", vote.account_id))
        })?;
        let participant = state
            .participants
            .get_mut(&vote.participant_id)
            .ok_or_else(|| {
                StorageError::NotFound(format!("participant {} not found", vote.participant_id))
            })?;

        let key = (vote.account_id, vote.participant_id, vote.day);
        if state.vote_keys.contains(&key) {
            return Err(StorageError::Duplicate(format!(
                "vote by account {} for participant {} on {} already recorded",
                vote.account_id, vote.participant_id, vote.day
            )));
        }
        if account.balance < delta.cost {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers vote cost {}",
                account.id, account.balance, delta.cost
            )));
        }

        delta.apply(account, participant)?;
        let receipt = VoteReceipt {
            vote: vote.clone(),
            balance_after: account.balance,
            participant_votes: participant.votes_received,
            participant_points: participant.points_total,
        };
        state.vote_keys.insert(key);
        state.votes.push(vote.clone());

        debug!(vote_id = %vote.vote_id, "vote committed in memory");
        Ok(receipt)
    }

    async fn commit_alliance(&self, delta: &AllianceDelta) -> StorageResult<AllianceReceipt> {
        if delta.opens.account_id != delta.account_id || !delta.opens.is_open() {
            return Err(StorageError::InvalidInput(
                "alliance delta must open a new alliance for its own account".to_string(),
            ));
        }

        let mut guard = self.write()?;
        let state = &mut *guard;

        if !state.participants.contains_key(&delta.opens.participant_id) {
            return Err(StorageError::NotFound(format!(
                "participant {} not found",
                delta.opens.participant_id
            )));
        }
        let account = state.accounts.get_mut(&delta.account_id).ok_or_else(|| {
            StorageError::NotFound(format!("account {} not found", delta.account_id))
        })?;

        let open_idx = state.open_slots.get(&delta.account_id).copied();
        let current = open_idx.map(|idx| state.alliances[idx].alliance_id);
        if current != delta.closes {
            return Err(StorageError::Conflict(format!(
                "open alliance of account {} changed since it was read",
                delta.account_id
            )));
        }
        if account.balance < delta.cost {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers alliance cost {}",
                account.id, account.balance, delta.cost
            )));
        }

        delta.apply(account)?;
        let balance_after = account.balance;
        if let Some(idx) = open_idx {
            delta.close(&mut state.alliances[idx]);
        }

        state.alliances.push(delta.opens.clone());
        state
            .open_slots
            .insert(delta.account_id, state.alliances.len() - 1);

        Ok(AllianceReceipt {
            alliance: delta.opens.clone(),
            closed: delta.closes,
            balance_after,
        })
    }

    async fn commit_donation(&self, delta: &DonationDelta) -> StorageResult<DonationReceipt> {
        if delta.amount <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "donation amount must be positive, got {}",
                delta.amount
            )));
        }

        let mut guard = self.write()?;
        let state = &mut *guard;

        let account = state.accounts.get_mut(&delta.account_id).ok_or_else(|| {
            StorageError::NotFound(format!("account {} not found", delta.account_id))
        })?;
        let objective = state
            .objectives
            .get_mut(&delta.objective_id)
            .ok_or_else(|| {
                StorageError::NotFound(format!("objective {} not found", delta.objective_id))
            })?;

        if !objective.active {
            return Err(StorageError::Conflict(format!(
                "objective {} closed since it was read",
                objective.id
            )));
        }
        if account.balance < delta.amount {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers donation {}",
                account.id, account.balance, delta.amount
            )));
        }

        let key = (delta.account_id, delta.objective_id);
        let existing = state.donations.get(&key).cloned();
        let entry = delta.apply(account, objective, existing)?;
        let receipt = DonationReceipt {
            entry: entry.clone(),
            balance_after: account.balance,
            objective_accumulated: objective.accumulated,
            objective_active: objective.active,
        };
        state.donations.insert(key, entry);
        Ok(receipt)
    }
}

fn apply_window<T>(items: Vec<T>, window: QueryWindow) -> Vec<T> {
    let iter = items.into_iter().skip(window.offset);
    if window.limit == 0 {
        iter.collect()
    } else {
        iter.take(window.limit).collect()
    }
}
