//! PostgreSQL adapter for the fanledger store.
//!
//! This adapter is the transactional source-of-truth backend. Every commit runs
//! in one transaction that locks the account row (`FOR UPDATE`) before
//! re-validating the delta, so concurrent commits for the same account are
//! serialized. Lock order is always account, then objective.
//!
//! Uniqueness is enforced by the schema:
//! - `fan_votes` UNIQUE (account_id, participant_id, vote_day)
//! - `fan_alliances` partial UNIQUE (account_id) WHERE ended_at IS NULL
//! - `fan_donation_entries` PRIMARY KEY (account_id, objective_id)

use crate::traits::{
    AccountStore, ActionLogStore, CommitStore, ContentStore, ObjectiveStore, ParticipantStore,
    QueryWindow,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fanledger_types::{
    Account, AccountId, Alliance, AllianceDelta, AllianceId, AllianceReceipt, Challenge,
    ChallengeId, DonationDelta, DonationLedgerEntry, DonationObjective, DonationReceipt,
    NewChallenge, NewObjective, NewParticipant, NewVideo, ObjectiveId, Participant, ParticipantId,
    TopVideo, VideoId, VoteDelta, VoteId, VoteReceipt, VoteRecord,
};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5, 0).await
    }

    /// Connect with explicit pool parameters. A `statement_timeout_ms` of 0
    /// keeps the server default.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
        statement_timeout_ms: u64,
    ) -> StorageResult<Self> {
        let mut options = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs));
        if statement_timeout_ms > 0 {
            options = options.after_connect(move |conn, _meta| {
                Box::pin(async move {
                    let stmt = format!("SET statement_timeout = {statement_timeout_ms}");
                    sqlx::query(&stmt).execute(&mut *conn).await?;
                    Ok(())
                })
            });
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        info!(max_connections, "postgres ledger store ready");
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS fan_accounts (
                account_id BIGSERIAL PRIMARY KEY,
                nickname TEXT NOT NULL UNIQUE,
                balance BIGINT NOT NULL DEFAULT 0 CHECK (balance >= 0),
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_participants (
                participant_id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                instagram TEXT,
                tiktok TEXT,
                photo TEXT,
                votes_received BIGINT NOT NULL DEFAULT 0 CHECK (votes_received >= 0),
                points_total BIGINT NOT NULL DEFAULT 0 CHECK (points_total >= 0),
                removed BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_votes (
                vote_id UUID PRIMARY KEY,
                account_id BIGINT NOT NULL REFERENCES fan_accounts (account_id),
                participant_id BIGINT NOT NULL REFERENCES fan_participants (participant_id),
                vote_day DATE NOT NULL,
                cast_at TIMESTAMPTZ NOT NULL,
                UNIQUE (account_id, participant_id, vote_day)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_alliances (
                alliance_id UUID PRIMARY KEY,
                account_id BIGINT NOT NULL REFERENCES fan_accounts (account_id),
                participant_id BIGINT NOT NULL REFERENCES fan_participants (participant_id),
                started_at TIMESTAMPTZ NOT NULL,
                ended_at TIMESTAMPTZ
            )
            "#,
            "CREATE INDEX IF NOT EXISTS fan_alliances_account_end ON fan_alliances (account_id, ended_at)",
            "CREATE UNIQUE INDEX IF NOT EXISTS fan_alliances_open_slot ON fan_alliances (account_id) WHERE ended_at IS NULL",
            r#"
            CREATE TABLE IF NOT EXISTS fan_objectives (
                objective_id BIGSERIAL PRIMARY KEY,
                participant_id BIGINT NOT NULL REFERENCES fan_participants (participant_id),
                title TEXT NOT NULL,
                description TEXT,
                threshold BIGINT NOT NULL,
                accumulated BIGINT NOT NULL DEFAULT 0 CHECK (accumulated >= 0),
                active BOOLEAN NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_donation_entries (
                account_id BIGINT NOT NULL REFERENCES fan_accounts (account_id),
                objective_id BIGINT NOT NULL REFERENCES fan_objectives (objective_id),
                total_donated BIGINT NOT NULL CHECK (total_donated > 0),
                first_donated_at TIMESTAMPTZ NOT NULL,
                last_donated_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (account_id, objective_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_videos (
                video_id BIGSERIAL PRIMARY KEY,
                participant_id BIGINT NOT NULL REFERENCES fan_participants (participant_id),
                uploaded_at TIMESTAMPTZ NOT NULL,
                url TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS fan_challenges (
                challenge_id BIGSERIAL PRIMARY KEY,
                participant_id BIGINT NOT NULL REFERENCES fan_participants (participant_id),
                posted_at TIMESTAMPTZ NOT NULL,
                challenge_text TEXT NOT NULL,
                points BIGINT NOT NULL DEFAULT 0,
                completed BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PostgresLedgerStore {
    async fn open_account(
        &self,
        nickname: &str,
        opened_at: DateTime<Utc>,
    ) -> StorageResult<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO fan_accounts (nickname, balance, created_at)
            VALUES ($1, 0, $2)
            RETURNING account_id, nickname, balance, created_at
            "#,
        )
        .bind(nickname)
        .bind(opened_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        account_row_to_record(row)
    }

    async fn credit_account(&self, account_id: AccountId, amount: i64) -> StorageResult<Account> {
        if amount <= 0 {
            return Err(StorageError::InvalidInput(format!(
                "credit amount must be positive, got {amount}"
            )));
        }

        let row = sqlx::query(
            r#"
            UPDATE fan_accounts
               SET balance = balance + $2
             WHERE account_id = $1
            RETURNING account_id, nickname, balance, created_at
            "#,
        )
        .bind(account_id.0)
        .bind(amount)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;

        row.map(account_row_to_record)
            .transpose()?
            .ok_or_else(|| StorageError::NotFound(format!("account {account_id} not found")))
    }

    async fn get_account(&self, account_id: AccountId) -> StorageResult<Option<Account>> {
        let row = sqlx::query(
            "SELECT account_id, nickname, balance, created_at FROM fan_accounts WHERE account_id = $1",
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(account_row_to_record).transpose()
    }
}

#[async_trait]
impl ParticipantStore for PostgresLedgerStore {
    async fn create_participant(&self, participant: NewParticipant) -> StorageResult<Participant> {
        let row = sqlx::query(
            r#"
            INSERT INTO fan_participants (name, instagram, tiktok, photo)
            VALUES ($1, $2, $3, $4)
            RETURNING participant_id, name, instagram, tiktok, photo, votes_received, points_total, removed
            "#,
        )
        .bind(participant.name)
        .bind(participant.instagram)
        .bind(participant.tiktok)
        .bind(participant.photo)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        participant_row_to_record(row)
    }

    async fn set_participant_removed(
        &self,
        participant_id: ParticipantId,
        removed: bool,
    ) -> StorageResult<Participant> {
        let row = sqlx::query(
            r#"
            UPDATE fan_participants
               SET removed = $2
             WHERE participant_id = $1
            RETURNING participant_id, name, instagram, tiktok, photo, votes_received, points_total, removed
            "#,
        )
        .bind(participant_id.0)
        .bind(removed)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(participant_row_to_record)
            .transpose()?
            .ok_or_else(|| {
                StorageError::NotFound(format!("participant {participant_id} not found"))
            })
    }

    async fn get_participant(
        &self,
        participant_id: ParticipantId,
    ) -> StorageResult<Option<Participant>> {
        let row = sqlx::query(
            r#"
            SELECT participant_id, name, instagram, tiktok, photo, votes_received, points_total, removed
              FROM fan_participants
             WHERE participant_id = $1
            "#,
        )
        .bind(participant_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(participant_row_to_record).transpose()
    }

    async fn list_participants(&self) -> StorageResult<Vec<Participant>> {
        let rows = sqlx::query(
            r#"
            SELECT participant_id, name, instagram, tiktok, photo, votes_received, points_total, removed
              FROM fan_participants
             ORDER BY participant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(participant_row_to_record).collect()
    }
}

#[async_trait]
impl ActionLogStore for PostgresLedgerStore {
    async fn has_voted(
        &self,
        account_id: AccountId,
        participant_id: ParticipantId,
        day: NaiveDate,
    ) -> StorageResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM fan_votes
                 WHERE account_id = $1 AND participant_id = $2 AND vote_day = $3
            ) AS voted
            "#,
        )
        .bind(account_id.0)
        .bind(participant_id.0)
        .bind(day)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        row.try_get("voted").map_err(backend)
    }

    async fn votes_on_day(
        &self,
        account_id: AccountId,
        day: NaiveDate,
    ) -> StorageResult<Vec<VoteRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT vote_id, account_id, participant_id, vote_day, cast_at
              FROM fan_votes
             WHERE account_id = $1 AND vote_day = $2
             ORDER BY cast_at
            "#,
        )
        .bind(account_id.0)
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(vote_row_to_record).collect()
    }

    async fn vote_counts(&self) -> StorageResult<HashMap<ParticipantId, i64>> {
        let rows = sqlx::query(
            "SELECT participant_id, COUNT(*) AS votes FROM fan_votes GROUP BY participant_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("participant_id").map_err(backend)?;
                let votes: i64 = row.try_get("votes").map_err(backend)?;
                Ok((ParticipantId(id), votes))
            })
            .collect()
    }

    async fn open_alliance(&self, account_id: AccountId) -> StorageResult<Option<Alliance>> {
        let row = sqlx::query(
            r#"
            SELECT alliance_id, account_id, participant_id, started_at, ended_at
              FROM fan_alliances
             WHERE account_id = $1 AND ended_at IS NULL
            "#,
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(alliance_row_to_record).transpose()
    }

    async fn open_alliance_count(&self, participant_id: ParticipantId) -> StorageResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM fan_alliances WHERE participant_id = $1 AND ended_at IS NULL",
        )
        .bind(participant_id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        row.try_get("n").map_err(backend)
    }

    async fn list_alliances(
        &self,
        account_id: AccountId,
        window: QueryWindow,
    ) -> StorageResult<Vec<Alliance>> {
        // LIMIT NULL means no limit in PostgreSQL.
        let limit = if window.limit == 0 {
            None
        } else {
            Some(to_i64(window.limit)?)
        };
        let rows = sqlx::query(
            r#"
            SELECT alliance_id, account_id, participant_id, started_at, ended_at
              FROM fan_alliances
             WHERE account_id = $1
             ORDER BY started_at DESC
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id.0)
        .bind(limit)
        .bind(to_i64(window.offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(alliance_row_to_record).collect()
    }

    async fn donation_entry(
        &self,
        account_id: AccountId,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationLedgerEntry>> {
        let row = sqlx::query(
            r#"
            SELECT account_id, objective_id, total_donated, first_donated_at, last_donated_at
              FROM fan_donation_entries
             WHERE account_id = $1 AND objective_id = $2
            "#,
        )
        .bind(account_id.0)
        .bind(objective_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(donation_row_to_record).transpose()
    }

    async fn donation_totals(&self) -> StorageResult<HashMap<ObjectiveId, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT objective_id, SUM(total_donated)::BIGINT AS total
              FROM fan_donation_entries
             GROUP BY objective_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("objective_id").map_err(backend)?;
                let total: i64 = row.try_get("total").map_err(backend)?;
                Ok((ObjectiveId(id), total))
            })
            .collect()
    }
}

#[async_trait]
impl ObjectiveStore for PostgresLedgerStore {
    async fn create_objective(
        &self,
        objective: NewObjective,
        created_at: DateTime<Utc>,
    ) -> StorageResult<DonationObjective> {
        let row = sqlx::query(
            r#"
            INSERT INTO fan_objectives
                (participant_id, title, description, threshold, accumulated, active, created_at)
            VALUES ($1, $2, $3, $4, 0, $4 > 0, $5)
            RETURNING objective_id, participant_id, title, description, threshold, accumulated, active, created_at
            "#,
        )
        .bind(objective.participant_id.0)
        .bind(objective.title)
        .bind(objective.description)
        .bind(objective.threshold)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        objective_row_to_record(row)
    }

    async fn get_objective(
        &self,
        objective_id: ObjectiveId,
    ) -> StorageResult<Option<DonationObjective>> {
        let row = sqlx::query(
            r#"
            SELECT objective_id, participant_id, title, description, threshold, accumulated, active, created_at
              FROM fan_objectives
             WHERE objective_id = $1
            "#,
        )
        .bind(objective_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(objective_row_to_record).transpose()
    }

    async fn list_objectives(&self, active_only: bool) -> StorageResult<Vec<DonationObjective>> {
        let rows = sqlx::query(
            r#"
            SELECT objective_id, participant_id, title, description, threshold, accumulated, active, created_at
              FROM fan_objectives
             WHERE active OR NOT $1
             ORDER BY objective_id
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(objective_row_to_record).collect()
    }
}

#[async_trait]
impl ContentStore for PostgresLedgerStore {
    async fn add_video(&self, video: NewVideo) -> StorageResult<TopVideo> {
        let row = sqlx::query(
            r#"
            INSERT INTO fan_videos (participant_id, uploaded_at, url)
            VALUES ($1, $2, $3)
            RETURNING video_id, participant_id, uploaded_at, url
            "#,
        )
        .bind(video.participant_id.0)
        .bind(video.uploaded_at)
        .bind(video.url)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        video_row_to_record(row)
    }

    async fn list_videos(&self, participant_id: ParticipantId) -> StorageResult<Vec<TopVideo>> {
        let rows = sqlx::query(
            r#"
            SELECT video_id, participant_id, uploaded_at, url
              FROM fan_videos
             WHERE participant_id = $1
             ORDER BY video_id
            "#,
        )
        .bind(participant_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(video_row_to_record).collect()
    }

    async fn add_challenge(&self, challenge: NewChallenge) -> StorageResult<Challenge> {
        let row = sqlx::query(
            r#"
            INSERT INTO fan_challenges (participant_id, posted_at, challenge_text, points, completed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING challenge_id, participant_id, posted_at, challenge_text, points, completed
            "#,
        )
        .bind(challenge.participant_id.0)
        .bind(challenge.posted_at)
        .bind(challenge.text)
        .bind(challenge.points)
        .bind(challenge.completed)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        challenge_row_to_record(row)
    }

    async fn list_challenges(
        &self,
        participant_id: Option<ParticipantId>,
    ) -> StorageResult<Vec<Challenge>> {
        let rows = sqlx::query(
            r#"
            SELECT challenge_id, participant_id, posted_at, challenge_text, points, completed
              FROM fan_challenges
             WHERE $1::BIGINT IS NULL OR participant_id = $1
             ORDER BY posted_at DESC, challenge_id DESC
            "#,
        )
        .bind(participant_id.map(|p| p.0))
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(challenge_row_to_record).collect()
    }
}

#[async_trait]
impl CommitStore for PostgresLedgerStore {
    async fn commit_vote(&self, delta: &VoteDelta) -> StorageResult<VoteReceipt> {
        let vote = &delta.vote;
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let balance = lock_balance(&mut *tx, vote.account_id).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO fan_votes (vote_id, account_id, participant_id, vote_day, cast_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, participant_id, vote_day) DO NOTHING
            "#,
        )
        .bind(vote.vote_id.0)
        .bind(vote.account_id.0)
        .bind(vote.participant_id.0)
        .bind(vote.day)
        .bind(vote.cast_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;
        if inserted.rows_affected() == 0 {
            return Err(StorageError::Duplicate(format!(
                "vote by account {} for participant {} on {} already recorded",
                vote.account_id, vote.participant_id, vote.day
            )));
        }
        if balance < delta.cost {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers vote cost {}",
                vote.account_id, balance, delta.cost
            )));
        }

        let counters = sqlx::query(
            r#"
            UPDATE fan_participants
               SET votes_received = votes_received + 1,
                   points_total = points_total + $2
             WHERE participant_id = $1
            RETURNING votes_received, points_total
            "#,
        )
        .bind(vote.participant_id.0)
        .bind(delta.points_awarded)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?
        .ok_or_else(|| {
            StorageError::NotFound(format!("participant {} not found", vote.participant_id))
        })?;

        let balance_after = debit(&mut *tx, vote.account_id, delta.cost).await?;
        tx.commit().await.map_err(classify)?;

        debug!(vote_id = %vote.vote_id, "vote committed");
        Ok(VoteReceipt {
            vote: vote.clone(),
            balance_after,
            participant_votes: counters.try_get("votes_received").map_err(backend)?,
            participant_points: counters.try_get("points_total").map_err(backend)?,
        })
    }

    async fn commit_alliance(&self, delta: &AllianceDelta) -> StorageResult<AllianceReceipt> {
        if delta.opens.account_id != delta.account_id || !delta.opens.is_open() {
            return Err(StorageError::InvalidInput(
                "alliance delta must open a new alliance for its own account".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let balance = lock_balance(&mut *tx, delta.account_id).await?;

        let current = sqlx::query(
            "SELECT alliance_id FROM fan_alliances WHERE account_id = $1 AND ended_at IS NULL",
        )
        .bind(delta.account_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .map(|row| row.try_get::<Uuid, _>("alliance_id").map(AllianceId))
        .transpose()
        .map_err(backend)?;

        if current != delta.closes {
            return Err(StorageError::Conflict(format!(
                "open alliance of account {} changed since it was read",
                delta.account_id
            )));
        }
        if balance < delta.cost {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers alliance cost {}",
                delta.account_id, balance, delta.cost
            )));
        }

        if let Some(previous) = delta.closes {
            sqlx::query(
                "UPDATE fan_alliances SET ended_at = $2 WHERE alliance_id = $1 AND ended_at IS NULL",
            )
            .bind(previous.0)
            .bind(delta.switched_at())
            .execute(&mut *tx)
            .await
            .map_err(classify)?;
        }

        sqlx::query(
            r#"
            INSERT INTO fan_alliances (alliance_id, account_id, participant_id, started_at, ended_at)
            VALUES ($1, $2, $3, $4, NULL)
            "#,
        )
        .bind(delta.opens.alliance_id.0)
        .bind(delta.account_id.0)
        .bind(delta.opens.participant_id.0)
        .bind(delta.opens.started_at)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        let balance_after = debit(&mut *tx, delta.account_id, delta.cost).await?;
        tx.commit().await.map_err(classify)?;

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

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let balance = lock_balance(&mut *tx, delta.account_id).await?;

        let active: bool = sqlx::query(
            "SELECT active FROM fan_objectives WHERE objective_id = $1 FOR UPDATE",
        )
        .bind(delta.objective_id.0)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| {
            StorageError::NotFound(format!("objective {} not found", delta.objective_id))
        })?
        .try_get("active")
        .map_err(backend)?;

        if !active {
            return Err(StorageError::Conflict(format!(
                "objective {} closed since it was read",
                delta.objective_id
            )));
        }
        if balance < delta.amount {
            return Err(StorageError::Conflict(format!(
                "account {} balance {} no longer covers donation {}",
                delta.account_id, balance, delta.amount
            )));
        }

        // The active flag is derived from the committed total, not the snapshot.
        let objective = sqlx::query(
            r#"
            UPDATE fan_objectives
               SET accumulated = accumulated + $2,
                   active = (accumulated + $2) < threshold
             WHERE objective_id = $1
            RETURNING accumulated, active
            "#,
        )
        .bind(delta.objective_id.0)
        .bind(delta.amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        let entry = sqlx::query(
            r#"
            INSERT INTO fan_donation_entries
                (account_id, objective_id, total_donated, first_donated_at, last_donated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (account_id, objective_id) DO UPDATE SET
                total_donated = fan_donation_entries.total_donated + EXCLUDED.total_donated,
                last_donated_at = EXCLUDED.last_donated_at
            RETURNING account_id, objective_id, total_donated, first_donated_at, last_donated_at
            "#,
        )
        .bind(delta.account_id.0)
        .bind(delta.objective_id.0)
        .bind(delta.amount)
        .bind(delta.donated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        let balance_after = debit(&mut *tx, delta.account_id, delta.amount).await?;
        tx.commit().await.map_err(classify)?;

        Ok(DonationReceipt {
            entry: donation_row_to_record(entry)?,
            balance_after,
            objective_accumulated: objective.try_get("accumulated").map_err(backend)?,
            objective_active: objective.try_get("active").map_err(backend)?,
        })
    }
}

async fn lock_balance(conn: &mut PgConnection, account_id: AccountId) -> StorageResult<i64> {
    sqlx::query("SELECT balance FROM fan_accounts WHERE account_id = $1 FOR UPDATE")
        .bind(account_id.0)
        .fetch_optional(&mut *conn)
        .await
        .map_err(backend)?
        .ok_or_else(|| StorageError::NotFound(format!("account {account_id} not found")))?
        .try_get("balance")
        .map_err(backend)
}

async fn debit(conn: &mut PgConnection, account_id: AccountId, amount: i64) -> StorageResult<i64> {
    sqlx::query(
        "UPDATE fan_accounts SET balance = balance - $2 WHERE account_id = $1 RETURNING balance",
    )
    .bind(account_id.0)
    .bind(amount)
    .fetch_one(&mut *conn)
    .await
    .map_err(classify)?
    .try_get("balance")
    .map_err(backend)
}

fn account_row_to_record(row: PgRow) -> StorageResult<Account> {
    Ok(Account {
        id: AccountId(row.try_get("account_id").map_err(backend)?),
        nickname: row.try_get("nickname").map_err(backend)?,
        balance: row.try_get("balance").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn participant_row_to_record(row: PgRow) -> StorageResult<Participant> {
    Ok(Participant {
        id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        name: row.try_get("name").map_err(backend)?,
        instagram: row.try_get("instagram").map_err(backend)?,
        tiktok: row.try_get("tiktok").map_err(backend)?,
        photo: row.try_get("photo").map_err(backend)?,
        votes_received: row.try_get("votes_received").map_err(backend)?,
        points_total: row.try_get("points_total").map_err(backend)?,
        removed: row.try_get("removed").map_err(backend)?,
    })
}

fn vote_row_to_record(row: PgRow) -> StorageResult<VoteRecord> {
    Ok(VoteRecord {
        vote_id: VoteId(row.try_get("vote_id").map_err(backend)?),
        account_id: AccountId(row.try_get("account_id").map_err(backend)?),
        participant_id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        day: row.try_get("vote_day").map_err(backend)?,
        cast_at: row.try_get("cast_at").map_err(backend)?,
    })
}

fn alliance_row_to_record(row: PgRow) -> StorageResult<Alliance> {
    Ok(Alliance {
        alliance_id: AllianceId(row.try_get("alliance_id").map_err(backend)?),
        account_id: AccountId(row.try_get("account_id").map_err(backend)?),
        participant_id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        started_at: row.try_get("started_at").map_err(backend)?,
        ended_at: row.try_get("ended_at").map_err(backend)?,
    })
}

fn objective_row_to_record(row: PgRow) -> StorageResult<DonationObjective> {
    Ok(DonationObjective {
        id: ObjectiveId(row.try_get("objective_id").map_err(backend)?),
        participant_id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        title: row.try_get("title").map_err(backend)?,
        description: row.try_get("description").map_err(backend)?,
        threshold: row.try_get("threshold").map_err(backend)?,
        accumulated: row.try_get("accumulated").map_err(backend)?,
        active: row.try_get("active").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
    })
}

fn donation_row_to_record(row: PgRow) -> StorageResult<DonationLedgerEntry> {
    Ok(DonationLedgerEntry {
        account_id: AccountId(row.try_get("account_id").map_err(backend)?),
        objective_id: ObjectiveId(row.try_get("objective_id").map_err(backend)?),
        total_donated: row.try_get("total_donated").map_err(backend)?,
        first_donated_at: row.try_get("first_donated_at").map_err(backend)?,
        last_donated_at: row.try_get("last_donated_at").map_err(backend)?,
    })
}

fn video_row_to_record(row: PgRow) -> StorageResult<TopVideo> {
    Ok(TopVideo {
        id: VideoId(row.try_get("video_id").map_err(backend)?),
        participant_id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        uploaded_at: row.try_get("uploaded_at").map_err(backend)?,
        url: row.try_get("url").map_err(backend)?,
    })
}

fn challenge_row_to_record(row: PgRow) -> StorageResult<Challenge> {
    Ok(Challenge {
        id: ChallengeId(row.try_get("challenge_id").map_err(backend)?),
        participant_id: ParticipantId(row.try_get("participant_id").map_err(backend)?),
        posted_at: row.try_get("posted_at").map_err(backend)?,
        text: row.try_get("challenge_text").map_err(backend)?,
        points: row.try_get("points").map_err(backend)?,
        completed: row.try_get("completed").map_err(backend)?,
    })
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Classify constraint and concurrency failures instead of reporting them as
/// opaque backend errors.
fn classify(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation, serialization_failure, deadlock_detected
            Some("23505") | Some("40001") | Some("40P01") => {
                return StorageError::Conflict(db_err.message().to_string());
            }
            // foreign_key_violation
            Some("23503") => return StorageError::NotFound(db_err.message().to_string()),
            // check_violation
            Some("23514") => {
                return StorageError::InvariantViolation(db_err.message().to_string());
            }
            // numeric_value_out_of_range
            Some("22003") => return StorageError::InvalidInput(db_err.message().to_string()),
            _ => {}
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}
