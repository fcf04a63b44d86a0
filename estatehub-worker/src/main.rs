//! # EstateHub Worker
//!
//! Background process that delivers the emails the API queues in
//! `email_jobs`: verification links and 2FA sign-in codes.
//!
//! ## Architecture
//!
//! The worker:
//! - Requeues jobs left running by a crashed worker
//! - Claims pending jobs in batches (`FOR UPDATE SKIP LOCKED`)
//! - Renders each message from the recipient's current state
//! - Sends it through the console or HTTP relay backend
//! - Retries failed deliveries up to `WORKER_MAX_ATTEMPTS`
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/estatehub EMAIL_TOKEN_SECRET=... cargo run -p estatehub-worker
//! ```

use estatehub_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use estatehub_worker::{config::WorkerConfig, dispatcher::Dispatcher, mailer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "estatehub_worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "EstateHub Worker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = WorkerConfig::from_env()?;

    let pool = create_pool(
        DatabaseConfig::for_url(config.database_url.clone())
            .with_max_connections(config.max_connections),
    )
    .await?;

    let mailer = mailer::from_backend(&config.backend)?;
    let dispatcher = Dispatcher::new(pool.clone(), mailer, &config);

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received, finishing current batch...");
        shutdown.cancel();
    });

    tracing::info!("Worker ready and listening for email jobs");
    dispatcher.run().await?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
