/// Login audit records
///
/// One row per completed login. Rows are inserted and read, never updated.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::user_agent::UserAgentInfo;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuthenticationData {
    pub id: i64,
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub operating_system: String,
    pub device: String,
    pub browser: String,
    pub city: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What the API knows about the client at login time
#[derive(Debug, Clone, Default)]
pub struct NewAuthenticationData {
    pub user_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: UserAgentInfo,
    pub city: Option<String>,
}

impl AuthenticationData {
    pub async fn record(
        pool: &PgPool,
        data: NewAuthenticationData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuthenticationData>(
            r#"
            INSERT INTO authentication_data (user_id, ip_address, operating_system, device, browser, city)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, ip_address, operating_system, device, browser, city, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.ip_address)
        .bind(data.user_agent.operating_system)
        .bind(data.user_agent.device)
        .bind(data.user_agent.browser)
        .bind(data.city)
        .fetch_one(pool)
        .await
    }

    /// Most recent logins first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuthenticationData>(
            r#"
            SELECT id, user_id, ip_address, operating_system, device, browser, city, created_at
            FROM authentication_data
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
