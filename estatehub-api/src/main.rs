//! # EstateHub API Server
//!
//! Listing search, agency and listing CRUD, and user authentication over
//! HTTP. Outbound email is queued in the database for `estatehub-worker`.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/estatehub JWT_SECRET=... cargo run -p estatehub-api
//! ```

use estatehub_api::{
    app::{build_router, AppState},
    config::Config,
};
use estatehub_shared::db::{
    migrations::run_migrations,
    pool::{close_pool, create_pool, DatabaseConfig},
};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "estatehub_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        "EstateHub API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env()?;

    let pool = create_pool(
        DatabaseConfig::for_url(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    if config.facebook.access_token.is_none() {
        tracing::warn!("FACEBOOK_ACCESS_TOKEN not set; social login is disabled");
    }

    let address = config.bind_address();
    let state = AppState::from_config(pool.clone(), config)?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
