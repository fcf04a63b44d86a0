/// Property listing model and database operations
///
/// Value ranges are enforced twice: by `validator` on the request structs and
/// by CHECK constraints in the `properties` table.
///
/// | field     | range                 |
/// |-----------|-----------------------|
/// | price     | 1 000 ..= 500 000 000 |
/// | bedrooms  | 1 ..= 20              |
/// | bathrooms | 1 ..= 20              |
/// | sqft      | 10 ..= 10 000         |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::geo::{validate_point, Point, SRID};

pub const MIN_PRICE: i32 = 1_000;
pub const MAX_PRICE: i32 = 500_000_000;
pub const MIN_ROOMS: i32 = 1;
pub const MAX_ROOMS: i32 = 20;
pub const MIN_SQFT: i32 = 10;
pub const MAX_SQFT: i32 = 10_000;

pub(crate) const PROPERTY_COLUMNS: &str = r#"
    id, sale_type, thumbnail, title, address, price, listed_at, property_type,
    bedrooms, bathrooms, sqft, description, key_features,
    ST_X(coordinates) AS longitude, ST_Y(coordinates) AS latitude,
    agent_id, created_at, updated_at
"#;

/// Whether a listing is for sale or to rent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sale_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    ForSale,
    ToRent,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::ForSale => "for_sale",
            SaleType::ToRent => "to_rent",
        }
    }
}

impl std::str::FromStr for SaleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "for_sale" => Ok(SaleType::ForSale),
            "to_rent" => Ok(SaleType::ToRent),
            other => Err(format!(
                "Invalid sale_type '{}': expected for_sale or to_rent",
                other
            )),
        }
    }
}

/// Property listing
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Property {
    pub id: Uuid,
    pub sale_type: SaleType,

    /// Image URL
    pub thumbnail: Option<String>,

    pub title: String,
    pub address: String,
    pub price: i32,
    pub listed_at: DateTime<Utc>,
    pub property_type: String,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub sqft: i32,
    pub description: String,

    /// Free-form JSON, e.g. `{"garden": true, "parking": 2}`
    pub key_features: Option<serde_json::Value>,

    #[sqlx(flatten)]
    pub coordinates: Point,

    pub agent_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a listing
///
/// The agent is never taken from the body; it is the creating user's agency.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProperty {
    pub sale_type: SaleType,

    #[validate(url, length(max = 512))]
    pub thumbnail: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub title: String,

    #[validate(length(min = 1, max = 100))]
    pub address: String,

    #[validate(range(min = 1_000, max = 500_000_000))]
    pub price: i32,

    /// Defaults to now
    pub listed_at: Option<DateTime<Utc>>,

    #[validate(length(min = 1, max = 25))]
    pub property_type: String,

    #[validate(range(min = 1, max = 20))]
    pub bedrooms: i32,

    #[validate(range(min = 1, max = 20))]
    pub bathrooms: i32,

    #[validate(range(min = 10, max = 10_000))]
    pub sqft: i32,

    #[serde(default)]
    #[validate(length(max = 1024))]
    pub description: String,

    pub key_features: Option<serde_json::Value>,

    #[validate(custom(function = "validate_point"))]
    pub coordinates: Point,
}

/// Request body for a partial listing update
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProperty {
    pub sale_type: Option<SaleType>,

    #[validate(url, length(max = 512))]
    pub thumbnail: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub address: Option<String>,

    #[validate(range(min = 1_000, max = 500_000_000))]
    pub price: Option<i32>,

    #[validate(length(min = 1, max = 25))]
    pub property_type: Option<String>,

    #[validate(range(min = 1, max = 20))]
    pub bedrooms: Option<i32>,

    #[validate(range(min = 1, max = 20))]
    pub bathrooms: Option<i32>,

    #[validate(range(min = 10, max = 10_000))]
    pub sqft: Option<i32>,

    #[validate(length(max = 1024))]
    pub description: Option<String>,

    pub key_features: Option<serde_json::Value>,

    #[validate(custom(function = "validate_point"))]
    pub coordinates: Option<Point>,
}

impl UpdateProperty {
    pub fn is_empty(&self) -> bool {
        self.sale_type.is_none()
            && self.thumbnail.is_none()
            && self.title.is_none()
            && self.address.is_none()
            && self.price.is_none()
            && self.property_type.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.sqft.is_none()
            && self.description.is_none()
            && self.key_features.is_none()
            && self.coordinates.is_none()
    }
}

impl Property {
    pub async fn create(
        pool: &PgPool,
        agent_id: Uuid,
        data: &CreateProperty,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Property>(&format!(
            r#"
            INSERT INTO properties (sale_type, thumbnail, title, address, price, listed_at,
                                    property_type, bedrooms, bathrooms, sqft, description,
                                    key_features, coordinates, agent_id)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()), $7, $8, $9, $10, $11, $12,
                    ST_SetSRID(ST_MakePoint($13, $14), {SRID}), $15)
            RETURNING {PROPERTY_COLUMNS}
            "#
        ))
        .bind(data.sale_type)
        .bind(&data.thumbnail)
        .bind(&data.title)
        .bind(&data.address)
        .bind(data.price)
        .bind(data.listed_at)
        .bind(&data.property_type)
        .bind(data.bedrooms)
        .bind(data.bathrooms)
        .bind(data.sqft)
        .bind(&data.description)
        .bind(&data.key_features)
        .bind(data.coordinates.longitude)
        .bind(data.coordinates.latitude)
        .bind(agent_id)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(&format!(
            "SELECT {PROPERTY_COLUMNS} FROM properties WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Listings of one agent, newest first
    pub async fn list_for_agent(
        pool: &PgPool,
        agent_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(&format!(
            r#"
            SELECT {PROPERTY_COLUMNS}
            FROM properties
            WHERE agent_id = $1
            ORDER BY listed_at DESC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(agent_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: &UpdateProperty,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = update_query(id, data);
        query
            .build_query_as::<Property>()
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn update_query(id: Uuid, data: &UpdateProperty) -> QueryBuilder<'_, Postgres> {
    let mut query = QueryBuilder::new("UPDATE properties SET updated_at = NOW()");

    if let Some(sale_type) = data.sale_type {
        query.push(", sale_type = ").push_bind(sale_type);
    }
    if let Some(thumbnail) = &data.thumbnail {
        query.push(", thumbnail = ").push_bind(thumbnail);
    }
    if let Some(title) = &data.title {
        query.push(", title = ").push_bind(title);
    }
    if let Some(address) = &data.address {
        query.push(", address = ").push_bind(address);
    }
    if let Some(price) = data.price {
        query.push(", price = ").push_bind(price);
    }
    if let Some(property_type) = &data.property_type {
        query.push(", property_type = ").push_bind(property_type);
    }
    if let Some(bedrooms) = data.bedrooms {
        query.push(", bedrooms = ").push_bind(bedrooms);
    }
    if let Some(bathrooms) = data.bathrooms {
        query.push(", bathrooms = ").push_bind(bathrooms);
    }
    if let Some(sqft) = data.sqft {
        query.push(", sqft = ").push_bind(sqft);
    }
    if let Some(description) = &data.description {
        query.push(", description = ").push_bind(description);
    }
    if let Some(key_features) = &data.key_features {
        query.push(", key_features = ").push_bind(key_features);
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
    query.push(format!(" RETURNING {PROPERTY_COLUMNS}"));
    query
}
