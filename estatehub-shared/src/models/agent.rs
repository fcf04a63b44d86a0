/// Agent (agency) model and database operations
///
/// An agent is a real-estate agency. It owns listings and may have users
/// acting for it through `users.agency_id`. Deleting an agent deletes its
/// listings and unlinks its users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::geo::{validate_point, Point, SRID};

const AGENT_COLUMNS: &str = r#"
    id, name, address, phone_number, description,
    ST_X(coordinates) AS longitude, ST_Y(coordinates) AS latitude,
    created_at, updated_at
"#;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone_number: String,
    pub description: String,

    #[sqlx(flatten)]
    pub coordinates: Point,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating an agent
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAgent {
    #[validate(length(min = 1, max = 256))]
    pub name: String,

    #[validate(length(min = 1, max = 256))]
    pub address: String,

    #[validate(length(min = 1, max = 16))]
    pub phone_number: String,

    #[serde(default)]
    pub description: String,

    #[validate(custom(function = "validate_point"))]
    pub coordinates: Point,
}

/// Request body for a partial agent update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAgent {
    #[validate(length(min = 1, max = 256))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub address: Option<String>,

    #[validate(length(min = 1, max = 16))]
    pub phone_number: Option<String>,

    pub description: Option<String>,

    #[validate(custom(function = "validate_point"))]
    pub coordinates: Option<Point>,
}

impl UpdateAgent {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.phone_number.is_none()
            && self.description.is_none()
            && self.coordinates.is_none()
    }
}

impl Agent {
    pub async fn create(pool: &PgPool, data: &CreateAgent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Agent>(&format!(
            r#"
            INSERT INTO agents (name, address, phone_number, description, coordinates)
            VALUES ($1, $2, $3, $4, ST_SetSRID(ST_MakePoint($5, $6), {SRID}))
            RETURNING {AGENT_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.address)
        .bind(&data.phone_number)
        .bind(&data.description)
        .bind(data.coordinates.longitude)
        .bind(data.coordinates.latitude)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Agent>(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists agents by name
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Agent>(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents ORDER BY name ASC, id ASC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    /// Applies the fields present in `data`; returns `None` if the agent is gone
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &UpdateAgent,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = update_query(id, data);
        query
            .build_query_as::<Agent>()
            .fetch_optional(pool)
            .await
    }

    /// Returns true if a row was deleted
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn update_query(id: Uuid, data: &UpdateAgent) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::new("UPDATE agents SET updated_at = NOW()");

    if let Some(name) = &data.name {
        query.push(", name = ").push_bind(name);
    }
    if let Some(address) = &data.address {
        query.push(", address = ").push_bind(address);
    }
    if let Some(phone_number) = &data.phone_number {
        query.push(", phone_number = ").push_bind(phone_number);
    }
    if let Some(description) = &data.description {
        query.push(", description = ").push_bind(description);
    }
    if let Some(point) = &data.coordinates {
        query
            .push(", coordinates = ST_SetSRID(ST_MakePoint(")
            .push_bind(point.longitude)
            .push(", ")
            .push_bind(point.latitude)
            .push(format!("), {SRID})"));
    }

    query.push(" WHERE id = ").push_bind(id);
    query.push(format!(" RETURNING {AGENT_COLUMNS}"));
    query
}
