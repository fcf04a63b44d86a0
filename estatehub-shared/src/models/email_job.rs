/// Outbound email jobs
///
/// The API enqueues a job and returns immediately; the worker claims pending
/// jobs, renders and sends them, then marks them sent or failed.
///
/// State transitions:
///
/// ```text
/// pending -> running -> sent
///                    -> failed
///            running -> pending   (stale job requeued after a crash)
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const EMAIL_JOB_COLUMNS: &str =
    "id, kind, user_id, state, attempts, last_error, created_at, updated_at, sent_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_job_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailJobKind {
    /// Link to `/v1/users/email/verify/{uid}/{token}`
    VerifyEmail,

    /// Current TOTP code for a 2FA login
    TwoFactorCode,
}

impl EmailJobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailJobKind::VerifyEmail => "verify_email",
            EmailJobKind::TwoFactorCode => "two_factor_code",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "email_job_state", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EmailJobState {
    Pending,
    Running,
    Sent,
    Failed,
}

impl EmailJobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EmailJobState::Sent | EmailJobState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EmailJob {
    pub id: Uuid,
    pub kind: EmailJobKind,
    pub user_id: Uuid,
    pub state: EmailJobState,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl EmailJob {
    /// Queues an email for a user
    pub async fn enqueue<'e, E>(
        executor: E,
        kind: EmailJobKind,
        user_id: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let job = sqlx::query_as::<_, EmailJob>(&format!(
            "INSERT INTO email_jobs (kind, user_id) VALUES ($1, $2) RETURNING {EMAIL_JOB_COLUMNS}"
        ))
        .bind(kind)
        .bind(user_id)
        .fetch_one(executor)
        .await?;

        tracing::debug!(job_id = %job.id, kind = kind.as_str(), user_id = %user_id, "Email job queued");
        Ok(job)
    }

    /// Atomically moves up to `limit` pending jobs to running, oldest first
    ///
    /// Rows locked by another worker are skipped, so concurrent workers never
    /// claim the same job.
    pub async fn claim_pending(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EmailJob>(&format!(
            r#"
            WITH pending AS (
                SELECT id
                FROM email_jobs
                WHERE state = $1
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE email_jobs
            SET state = $3, attempts = email_jobs.attempts + 1, updated_at = NOW()
            FROM pending
            WHERE email_jobs.id = pending.id
            RETURNING {}
            "#,
            qualified_columns()
        ))
        .bind(EmailJobState::Pending)
        .bind(limit)
        .bind(EmailJobState::Running)
        .fetch_all(pool)
        .await
    }

    /// Returns false if the job was not running
    pub async fn mark_sent(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE email_jobs
            SET state = $2, sent_at = NOW(), updated_at = NOW(), last_error = NULL
            WHERE id = $1 AND state = $3
            "#,
        )
        .bind(id)
        .bind(EmailJobState::Sent)
        .bind(EmailJobState::Running)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records a delivery error; the job goes back to pending until
    /// `max_attempts` is reached, then fails for good
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        max_attempts: i32,
    ) -> Result<Option<EmailJobState>, sqlx::Error> {
        let state: Option<(EmailJobState,)> = sqlx::query_as(
            r#"
            UPDATE email_jobs
            SET state = CASE WHEN attempts >= $3 THEN $4 ELSE $5 END,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1 AND state = $6
            RETURNING state
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .bind(EmailJobState::Failed)
        .bind(EmailJobState::Pending)
        .bind(EmailJobState::Running)
        .fetch_optional(pool)
        .await?;

        Ok(state.map(|(s,)| s))
    }

    /// Puts jobs stuck in running for longer than `older_than` back in the queue
    pub async fn requeue_stale(
        pool: &PgPool,
        older_than: chrono::Duration,
    ) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now() - older_than;
        let result = sqlx::query(
            r#"
            UPDATE email_jobs
            SET state = $1, updated_at = NOW()
            WHERE state = $2 AND updated_at < $3
            "#,
        )
        .bind(EmailJobState::Pending)
        .bind(EmailJobState::Running)
        .bind(cutoff)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn pending_count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_jobs WHERE state = $1")
            .bind(EmailJobState::Pending)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

fn qualified_columns() -> String {
    EMAIL_JOB_COLUMNS
        .split(", ")
        .map(|c| format!("email_jobs.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
