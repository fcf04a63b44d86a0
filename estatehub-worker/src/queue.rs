/// Email job queue
///
/// Thin layer over [`EmailJob`] that carries the worker's batch size and
/// retry limit, and loads the user each job is addressed to.
///
/// # Polling Strategy
///
/// - Claims use `FOR UPDATE SKIP LOCKED`, so several workers can share a queue
/// - Ordering: FIFO (`created_at ASC`)
/// - A failed delivery returns the job to `pending` until `max_attempts`
///
/// # Example
///
/// ```no_run
/// use estatehub_worker::queue::EmailQueue;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let queue = EmailQueue::new(pool, 10, 5);
/// for job in queue.claim().await? {
///     println!("Claimed {} for {}", job.kind.as_str(), job.user_id);
/// }
/// # Ok(())
/// # }
/// ```

use estatehub_shared::models::{
    email_job::{EmailJob, EmailJobState},
    user::User,
};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Clone)]
pub struct EmailQueue {
    db: PgPool,
    batch_size: i64,
    max_attempts: i32,
}

impl EmailQueue {
    pub fn new(db: PgPool, batch_size: i64, max_attempts: i32) -> Self {
        Self {
            db,
            batch_size,
            max_attempts,
        }
    }

    /// Moves up to one batch of pending jobs to running
    pub async fn claim(&self) -> Result<Vec<EmailJob>, QueueError> {
        let jobs = EmailJob::claim_pending(&self.db, self.batch_size).await?;
        if !jobs.is_empty() {
            tracing::debug!(count = jobs.len(), "Claimed email jobs");
        }
        Ok(jobs)
    }

    pub async fn recipient(&self, job: &EmailJob) -> Result<Option<User>, QueueError> {
        Ok(User::find_by_id(&self.db, job.user_id).await?)
    }

    pub async fn mark_sent(&self, id: Uuid) -> Result<(), QueueError> {
        if !EmailJob::mark_sent(&self.db, id).await? {
            tracing::warn!(job_id = %id, "Job was no longer running when marked sent");
        }
        Ok(())
    }

    /// Records the error and returns the job's new state, `None` if it was
    /// no longer running
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
    ) -> Result<Option<EmailJobState>, QueueError> {
        Ok(EmailJob::mark_failed(&self.db, id, error, self.max_attempts).await?)
    }

    /// Fails the job without further retries
    pub async fn abandon(&self, id: Uuid, error: &str) -> Result<(), QueueError> {
        EmailJob::mark_failed(&self.db, id, error, 0).await?;
        Ok(())
    }

    /// Returns running jobs older than `older_than` to the queue
    pub async fn requeue_stale(&self, older_than: std::time::Duration) -> Result<u64, QueueError> {
        let older_than = chrono::Duration::from_std(older_than)
            .unwrap_or_else(|_| chrono::Duration::seconds(300));
        let count = EmailJob::requeue_stale(&self.db, older_than).await?;
        if count > 0 {
            tracing::warn!(count, "Requeued stale email jobs");
        }
        Ok(count)
    }
}
