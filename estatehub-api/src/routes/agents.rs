/// Agent (agency) endpoints
///
/// # Endpoints
///
/// - `GET /v1/agents` - List agents
/// - `POST /v1/agents` - Create agent (industry professionals)
/// - `GET /v1/agents/:id` - Get agent
/// - `GET /v1/agents/:id/properties` - Agent's listings, newest first
/// - `PATCH /v1/agents/:id` - Update agent (members of the agency)
/// - `DELETE /v1/agents/:id` - Delete agent and its listings (members of the agency)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use estatehub_shared::{
    auth::{
        authorization::{current_user, require_agency_match, require_professional},
        middleware::AuthContext,
    },
    models::{
        agent::{Agent, CreateAgent, UpdateAgent},
        property::Property,
        user::User,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Pagination query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Agent not found".to_string())
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Agent>>> {
    let agents = Agent::list(&state.db, query.limit(), query.offset()).await?;
    Ok(Json(agents))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Agent>> {
    let agent = Agent::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(agent))
}

pub async fn list_agent_properties(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Property>>> {
    Agent::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    let properties =
        Property::list_for_agent(&state.db, id, query.limit(), query.offset()).await?;
    Ok(Json(properties))
}

/// Create an agent
///
/// A creator without an agency becomes a member of the new one.
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed
/// - `403 Forbidden`: Caller is not an industry professional
pub async fn create_agent(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateAgent>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let user = current_user(&state.db, &auth).await?;
    require_professional(&user)?;

    let agent = Agent::create(&state.db, &req).await?;
    if user.agency_id.is_none() {
        User::set_agency(&state.db, user.id, Some(agent.id)).await?;
    }

    tracing::info!(agent_id = %agent.id, user_id = %user.id, "Agent created");
    Ok((StatusCode::CREATED, Json(agent)))
}

/// Partially update an agent
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, or the user has no agency
/// - `403 Forbidden`: Caller belongs to another agency
/// - `404 Not Found`: No such agent
pub async fn update_agent(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgent>,
) -> ApiResult<Json<Agent>> {
    req.validate()?;
    if req.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let user = current_user(&state.db, &auth).await?;
    require_agency_match(&user, id)?;

    let agent = Agent::update(&state.db, id, &req)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(agent_id = %id, user_id = %user.id, "Agent updated");
    Ok(Json(agent))
}

/// Delete an agent; its listings go with it
///
/// # Errors
///
/// - `400 Bad Request`: The user has no agency
/// - `403 Forbidden`: Caller belongs to another agency
/// - `404 Not Found`: No such agent
pub async fn delete_agent(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state.db, &auth).await?;
    require_agency_match(&user, id)?;

    if !Agent::delete(&state.db, id).await? {
        return Err(not_found());
    }

    tracing::info!(agent_id = %id, user_id = %user.id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_query_bounds() {
        let query = ListQuery::default();
        assert_eq!(query.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            limit: Some(1_000),
            offset: Some(-5),
        };
        assert_eq!(query.limit(), MAX_PAGE_SIZE);
        assert_eq!(query.offset(), 0);

        let query = ListQuery {
            limit: Some(0),
            offset: Some(20),
        };
        assert_eq!(query.limit(), 1);
        assert_eq!(query.offset(), 20);
    }
}
