use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::{PollRepository, PollStore, RecordOutcome, VoteLedger, VoteOutcome};
use crate::domain::{NewPoll, Poll, PollOption};
use crate::error::{AppError, AppResult};

/// One row of the polls ⋈ poll_options join
#[derive(Debug, sqlx::FromRow)]
struct PollOptionRow {
    poll_id: Uuid,
    question: String,
    creator_id: String,
    created_at: DateTime<Utc>,
    option_id: Uuid,
    label: String,
    votes: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct OptionRow {
    id: Uuid,
    label: String,
    votes: i64,
}

impl From<OptionRow> for PollOption {
    fn from(row: OptionRow) -> Self {
        PollOption {
            id: row.id,
            label: row.label,
            votes: row.votes,
        }
    }
}

/// Fold joined rows (ordered by poll, then position) into polls
fn fold_rows(rows: Vec<PollOptionRow>) -> Vec<Poll> {
    let mut polls: Vec<Poll> = Vec::new();
    for row in rows {
        let option = PollOption {
            id: row.option_id,
            label: row.label,
            votes: row.votes,
        };
        match polls.last_mut() {
            Some(poll) if poll.id == row.poll_id => poll.options.push(option),
            _ => polls.push(Poll {
                id: row.poll_id,
                question: row.question,
                creator_id: row.creator_id,
                created_at: row.created_at,
                options: vec![option],
            }),
        }
    }
    polls
}

fn position_of(option_index: usize) -> Option<i32> {
    i32::try_from(option_index).ok()
}

fn option_position(idx: usize) -> AppResult<i32> {
    position_of(idx).ok_or_else(|| {
        AppError::Validation(format!("Poll cannot have more than {} options", i32::MAX))
    })
}

async fn fetch_poll(conn: &mut PgConnection, poll_id: Uuid) -> AppResult<Option<Poll>> {
    let rows = sqlx::query_as::<_, PollOptionRow>(
        r#"
        SELECT p.id AS poll_id, p.question, p.creator_id, p.created_at,
               o.id AS option_id, o.label, o.votes
        FROM polls p
        JOIN poll_options o ON o.poll_id = p.id
        WHERE p.id = $1
        ORDER BY o.position ASC
        "#,
    )
    .bind(poll_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(fold_rows(rows).pop())
}

async fn increment_in(
    conn: &mut PgConnection,
    poll_id: Uuid,
    position: i32,
) -> AppResult<Option<PollOption>> {
    let row = sqlx::query_as::<_, OptionRow>(
        r#"
        UPDATE poll_options
        SET votes = votes + 1
        WHERE poll_id = $1 AND position = $2
        RETURNING id, label, votes
        "#,
    )
    .bind(poll_id)
    .bind(position)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(PollOption::from))
}

async fn insert_vote_record(
    conn: &mut PgConnection,
    poll_id: Uuid,
    voter_id: &str,
) -> AppResult<RecordOutcome> {
    let result = sqlx::query(
        r#"
        INSERT INTO vote_records (poll_id, voter_id)
        VALUES ($1, $2)
        ON CONFLICT (poll_id, voter_id) DO NOTHING
        "#,
    )
    .bind(poll_id)
    .bind(voter_id)
    .execute(&mut *conn)
    .await?;

    Ok(if result.rows_affected() == 1 {
        RecordOutcome::Recorded
    } else {
        RecordOutcome::AlreadyVoted
    })
}

/// PostgreSQL-backed poll store and vote ledger
#[derive(Clone)]
pub struct PgPollRepository {
    pool: PgPool,
}

impl PgPollRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PollStore for PgPollRepository {
    async fn create_poll(&self, new_poll: NewPoll) -> AppResult<Poll> {
        let mut tx = self.pool.begin().await?;

        let poll_id = Uuid::new_v4();
        let created_at: DateTime<Utc> = sqlx::query_scalar(
            r#"
            INSERT INTO polls (id, question, creator_id)
            VALUES ($1, $2, $3)
            RETURNING created_at
            "#,
        )
        .bind(poll_id)
        .bind(&new_poll.question)
        .bind(&new_poll.creator_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut options = Vec::with_capacity(new_poll.options.len());
        for (idx, label) in new_poll.options.into_iter().enumerate() {
            let position = option_position(idx)?;
            let option_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO poll_options (id, poll_id, position, label)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(option_id)
            .bind(poll_id)
            .bind(position)
            .bind(&label)
            .execute(&mut *tx)
            .await?;

            options.push(PollOption {
                id: option_id,
                label,
                votes: 0,
            });
        }

        tx.commit().await?;

        Ok(Poll {
            id: poll_id,
            question: new_poll.question,
            creator_id: new_poll.creator_id,
            created_at,
            options,
        })
    }

    async fn get_poll(&self, poll_id: Uuid) -> AppResult<Option<Poll>> {
        let mut conn = self.pool.acquire().await?;
        fetch_poll(&mut conn, poll_id).await
    }

    async fn list_polls(&self) -> AppResult<Vec<Poll>> {
        // Single statement, single snapshot
        let rows = sqlx::query_as::<_, PollOptionRow>(
            r#"
            SELECT p.id AS poll_id, p.question, p.creator_id, p.created_at,
                   o.id AS option_id, o.label, o.votes
            FROM polls p
            JOIN poll_options o ON o.poll_id = p.id
            ORDER BY p.created_at ASC, p.id ASC, o.position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(fold_rows(rows))
    }

    async fn delete_poll(&self, poll_id: Uuid) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Poll row first, so in-flight ballots (holding FOR SHARE) finish before
        // their option rows are touched
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM polls WHERE id = $1 FOR UPDATE")
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        sqlx::query("DELETE FROM poll_options WHERE poll_id = $1")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM polls WHERE id = $1")
            .bind(poll_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_option(
        &self,
        poll_id: Uuid,
        option_index: usize,
    ) -> AppResult<Option<PollOption>> {
        let Some(position) = position_of(option_index) else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        increment_in(&mut conn, poll_id, position).await
    }
}

#[async_trait]
impl VoteLedger for PgPollRepository {
    async fn has_voted(&self, poll_id: Uuid, voter_id: &str) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM vote_records
                WHERE poll_id = $1 AND voter_id = $2
            )
            "#,
        )
        .bind(poll_id)
        .bind(voter_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn record_vote(&self, poll_id: Uuid, voter_id: &str) -> AppResult<RecordOutcome> {
        let mut conn = self.pool.acquire().await?;
        insert_vote_record(&mut conn, poll_id, voter_id).await
    }
}

#[async_trait]
impl PollRepository for PgPollRepository {
    async fn submit_vote(
        &self,
        poll_id: Uuid,
        option_index: usize,
        voter_id: &str,
    ) -> AppResult<VoteOutcome> {
        let mut tx = self.pool.begin().await?;

        // Share lock: a concurrent delete waits for this ballot to finish
        let poll_exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM polls WHERE id = $1 FOR SHARE")
            .bind(poll_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !poll_exists {
            return Ok(VoteOutcome::PollNotFound);
        }

        let Some(position) = position_of(option_index) else {
            return Ok(VoteOutcome::InvalidOption);
        };
        let option_exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM poll_options WHERE poll_id = $1 AND position = $2",
        )
        .bind(poll_id)
        .bind(position)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
        if !option_exists {
            return Ok(VoteOutcome::InvalidOption);
        }

        if insert_vote_record(&mut tx, poll_id, voter_id).await? == RecordOutcome::AlreadyVoted {
            // Dropping the transaction rolls it back
            debug!(%poll_id, "duplicate ballot rejected by ledger");
            return Ok(VoteOutcome::AlreadyVoted);
        }

        if increment_in(&mut tx, poll_id, position).await?.is_none() {
            return Err(AppError::Internal(format!(
                "option {position} of poll {poll_id} vanished mid-transaction"
            )));
        }

        let poll = fetch_poll(&mut tx, poll_id).await?.ok_or_else(|| {
            AppError::Internal(format!("poll {poll_id} vanished mid-transaction"))
        })?;

        tx.commit().await?;
        Ok(VoteOutcome::Counted(poll))
    }
}
