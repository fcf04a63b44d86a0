/// Database models for EstateHub
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `agent`: Real-estate agencies
/// - `property`: Listings owned by an agent
/// - `user`: User accounts, social identities and 2FA state
/// - `authentication_data`: Append-only login audit
/// - `email_job`: Queued outbound email, drained by the worker
///
/// # Example
///
/// ```no_run
/// use estatehub_shared::models::agent::Agent;
/// use estatehub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// for agent in Agent::list(&pool, 20, 0).await? {
///     println!("{} ({})", agent.name, agent.address);
/// }
/// # Ok(())
/// # }
/// ```

pub mod agent;
pub mod authentication_data;
pub mod email_job;
pub mod property;
pub mod user;
