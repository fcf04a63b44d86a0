/// Database layer for EstateHub
///
/// - `pool`: PostgreSQL connection pool with PostGIS health checks
/// - `migrations`: embedded schema migrations
///
/// Models live in the `models` module at crate root level.
///
/// # Example
///
/// ```no_run
/// use estatehub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let pool = create_pool(DatabaseConfig::for_url(std::env::var("DATABASE_URL")?)).await?;
///     estatehub_shared::db::migrations::run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
