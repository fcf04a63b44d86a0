/// Health check endpoint
///
/// Reports whether the database answers and whether PostGIS is installed,
/// since search and listing writes need it.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "postgis": "3.4"
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use estatehub_shared::db::pool;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Application version
    pub version: String,

    /// Database status
    pub database: String,

    /// PostGIS library version, if available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgis: Option<String>,
}

/// Health check handler
///
/// `status` is `degraded` when the database is unreachable or lacks PostGIS.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let connected = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();

    let postgis = if connected {
        match pool::postgis_version(&state.db).await {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(error = %e, "PostGIS version query failed");
                None
            }
        }
    } else {
        None
    };

    let healthy = connected && postgis.is_some();

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if connected { "connected" } else { "disconnected" }.to_string(),
        postgis,
    }))
}
