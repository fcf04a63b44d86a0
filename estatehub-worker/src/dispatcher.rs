/// Email dispatcher
///
/// The worker's main loop. It claims batches from the queue, renders each job
/// for its recipient, sends it through the configured [`Mailer`] and records
/// the outcome.
///
/// # Architecture
///
/// ```text
/// Dispatcher
///   ├─> EmailQueue: requeue stale jobs, claim a batch
///   ├─> EmailQueue: load the recipient
///   ├─> Renderer: subject and body
///   ├─> Mailer: deliver
///   └─> EmailQueue: mark sent / failed
/// ```
///
/// Jobs within a batch are delivered concurrently; the next batch is claimed
/// once the whole batch has settled. On shutdown the in-flight batch is
/// finished before `run` returns.
///
/// # Example
///
/// ```no_run
/// use estatehub_worker::{config::WorkerConfig, dispatcher::Dispatcher, mailer};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> anyhow::Result<()> {
/// let config = WorkerConfig::from_env()?;
/// let mailer = mailer::from_backend(&config.backend)?;
/// let dispatcher = Dispatcher::new(pool, mailer, &config);
///
/// dispatcher.run().await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::WorkerConfig,
    mailer::{MailError, Mailer},
    queue::{EmailQueue, QueueError},
    templates::{Renderer, TemplateError},
};
use estatehub_shared::models::{
    email_job::{EmailJob, EmailJobKind, EmailJobState},
    user::User,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// How often running jobs are checked for staleness
const STALE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Mail(#[from] MailError),
}

impl DeliveryError {
    /// Whether trying again later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Mail(_))
    }
}

/// What happened to a job apart from errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,

    /// Nothing was sent because the message no longer applies
    Skipped(&'static str),
}

/// Why a job should not be sent to this user as they are now
fn skip_reason(kind: EmailJobKind, user: &User) -> Option<&'static str> {
    if !user.is_active {
        return Some("user is inactive");
    }
    match kind {
        EmailJobKind::VerifyEmail if user.is_email_verified => Some("email already verified"),
        EmailJobKind::TwoFactorCode if !user.is_2fa_enabled => Some("two-factor authentication disabled"),
        _ => None,
    }
}

/// Renders and sends one job; touches no database
pub async fn deliver(
    mailer: &dyn Mailer,
    renderer: &Renderer,
    kind: EmailJobKind,
    user: &User,
) -> Result<Delivery, DeliveryError> {
    if let Some(reason) = skip_reason(kind, user) {
        return Ok(Delivery::Skipped(reason));
    }

    let email = renderer.render(kind, user)?;
    mailer.send(&email).await?;
    Ok(Delivery::Sent)
}

/// Everything a single job needs, cloned into each delivery task
#[derive(Clone)]
struct JobContext {
    queue: EmailQueue,
    mailer: Arc<dyn Mailer>,
    renderer: Renderer,
}

impl JobContext {
    async fn process(&self, job: EmailJob) -> Result<(), QueueError> {
        let Some(user) = self.queue.recipient(&job).await? else {
            tracing::warn!(job_id = %job.id, user_id = %job.user_id, "Recipient no longer exists");
            return self.queue.abandon(job.id, "user not found").await;
        };

        match deliver(self.mailer.as_ref(), &self.renderer, job.kind, &user).await {
            Ok(Delivery::Sent) => {
                tracing::info!(
                    job_id = %job.id,
                    kind = job.kind.as_str(),
                    mailer = self.mailer.name(),
                    "Email sent"
                );
                self.queue.mark_sent(job.id).await
            }
            Ok(Delivery::Skipped(reason)) => {
                tracing::info!(job_id = %job.id, kind = job.kind.as_str(), reason, "Email skipped");
                self.queue.mark_sent(job.id).await
            }
            Err(e) if e.is_retryable() => {
                let state = self.queue.mark_failed(job.id, &e.to_string()).await?;
                if state == Some(EmailJobState::Failed) {
                    tracing::error!(job_id = %job.id, attempts = job.attempts, error = %e, "Email failed permanently");
                } else {
                    tracing::warn!(job_id = %job.id, attempts = job.attempts, error = %e, "Email failed, will retry");
                }
                Ok(())
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Email cannot be rendered");
                self.queue.abandon(job.id, &e.to_string()).await
            }
        }
    }
}

pub struct Dispatcher {
    context: JobContext,
    poll_interval: Duration,
    stale_after: Duration,
    shutdown_token: CancellationToken,
}

impl Dispatcher {
    pub fn new(db: PgPool, mailer: Arc<dyn Mailer>, config: &WorkerConfig) -> Self {
        Dispatcher {
            context: JobContext {
                queue: EmailQueue::new(db, config.batch_size, config.max_attempts),
                mailer,
                renderer: Renderer::from_config(config),
            },
            poll_interval: config.poll_interval,
            stale_after: config.stale_after,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Used to signal graceful shutdown from external handlers
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Claims and processes one batch, returning how many jobs it held
    pub async fn run_once(&self) -> Result<usize, QueueError> {
        let jobs = self.context.queue.claim().await?;
        let count = jobs.len();

        let mut tasks = JoinSet::new();
        for job in jobs {
            let context = self.context.clone();
            tasks.spawn(async move {
                let job_id = job.id;
                if let Err(e) = context.process(job).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to record job outcome");
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Delivery task panicked");
            }
        }

        Ok(count)
    }

    /// Runs until the shutdown token is cancelled
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(mailer = self.context.mailer.name(), "Email dispatcher starting");

        let mut last_sweep: Option<Instant> = None;

        while !self.shutdown_token.is_cancelled() {
            if last_sweep.map_or(true, |at| at.elapsed() >= STALE_SWEEP_INTERVAL) {
                if let Err(e) = self.context.queue.requeue_stale(self.stale_after).await {
                    tracing::error!(error = %e, "Failed to requeue stale jobs");
                }
                last_sweep = Some(Instant::now());
            }

            match self.run_once().await {
                // More may be waiting
                Ok(count) if count > 0 => continue,
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Failed to claim email jobs"),
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => {}
                _ = sleep(self.poll_interval) => {}
            }
        }

        tracing::info!("Email dispatcher shut down");
        Ok(())
    }
}
