/// Property listing endpoints
///
/// Search is public. Writes require an authenticated user whose agency owns
/// the listing; new listings are always created for the caller's agency.
///
/// # Endpoints
///
/// - `GET /v1/properties?address=...` - Geographic search
/// - `POST /v1/properties` - Create listing
/// - `GET /v1/properties/:id` - Get listing
/// - `PATCH /v1/properties/:id` - Update listing
/// - `DELETE /v1/properties/:id` - Delete listing

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
        authorization::{current_user, require_agency, require_agency_match},
        middleware::AuthContext,
    },
    geo::Polygon,
    models::property::{CreateProperty, Property, UpdateProperty},
    search::{search_within, PropertyFilter, SearchParams},
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

/// Search results and the area they were matched against
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub properties: Vec<Property>,

    /// Rings of the searched polygon, `[longitude, latitude]` positions
    pub coordinates: Polygon,
}

fn search_address(params: &SearchParams) -> ApiResult<&str> {
    params
        .address
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Please provide address".to_string()))
}

fn not_found() -> ApiError {
    ApiError::NotFound("Property not found".to_string())
}

/// Geographic search
///
/// # Endpoint
///
/// ```text
/// GET /v1/properties?address=Camden&sale_type=for_sale&price_min=100000&price_max=450000&days_old=7d
/// ```
///
/// Optional filters: `sale_type`, `property_type`, `price_min`/`price_max`,
/// `bedrooms_min`/`bedrooms_max`, `bathrooms_min`/`bathrooms_max`, `days_old`
/// (`1d`, `3d`, `7d`, `14d`, `30d`).
///
/// # Response
///
/// ```json
/// {
///   "properties": [ ... ],
///   "coordinates": [[[-0.2, 51.5], [-0.1, 51.5], [-0.1, 51.6], [-0.2, 51.5]]]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Missing address, malformed or inverted filter
/// - `404 Not Found`: The address does not resolve to an area
/// - `502 Bad Gateway`: Geocoder failure
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let address = search_address(&params)?;
    let filter = PropertyFilter::from_params(&params)?;

    let polygon = state.geocoder.polygon_for(address).await?;
    let properties = search_within(&state.db, &polygon, &filter).await?;

    tracing::info!(address = %address, results = properties.len(), "Property search");

    Ok(Json(SearchResponse {
        properties,
        coordinates: polygon,
    }))
}

/// Create a listing for the caller's agency
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, or the user has no agency
/// - `401 Unauthorized`: Not authenticated
pub async fn create_property(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProperty>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let user = current_user(&state.db, &auth).await?;
    let agent_id = require_agency(&user)?;

    let property = Property::create(&state.db, agent_id, &req).await?;
    tracing::info!(property_id = %property.id, agent_id = %agent_id, "Property created");

    Ok((StatusCode::CREATED, Json(property)))
}

pub async fn get_property(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Property>> {
    let property = Property::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(property))
}

/// Partially update a listing
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed, no fields given, or the user has no agency
/// - `403 Forbidden`: Listing belongs to another agency
/// - `404 Not Found`: No such listing
pub async fn update_property(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProperty>,
) -> ApiResult<Json<Property>> {
    req.validate()?;
    if req.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let user = current_user(&state.db, &auth).await?;
    let property = Property::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    require_agency_match(&user, property.agent_id)?;

    let updated = Property::update(&state.db, id, &req)
        .await?
        .ok_or_else(not_found)?;
    tracing::info!(property_id = %id, user_id = %user.id, "Property updated");

    Ok(Json(updated))
}

/// Delete a listing
///
/// # Errors
///
/// - `400 Bad Request`: The user has no agency
/// - `403 Forbidden`: Listing belongs to another agency
/// - `404 Not Found`: No such listing
pub async fn delete_property(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let user = current_user(&state.db, &auth).await?;
    let property = Property::find_by_id(&state.db, id)
        .await?
        .ok_or_else(not_found)?;
    require_agency_match(&user, property.agent_id)?;

    if !Property::delete(&state.db, id).await? {
        return Err(not_found());
    }
    tracing::info!(property_id = %id, user_id = %user.id, "Property deleted");

    Ok(StatusCode::NO_CONTENT)
}
