//! Identity and profile handlers.
//!
//! Endpoints:
//! - GET   /api/v1/identities/me          - Caller's own account
//! - PATCH /api/v1/identities/me          - Profile edits
//! - GET   /api/v1/identities/{id}        - Account by id
//! - GET   /api/v1/agronomists            - Agronomist directory search
//! - POST  /api/v1/identities/me/withdraw - Agronomist payout

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use agrilink_core::identity::service::ProfileUpdate;
use agrilink_types::identity::Identity;

use crate::http::error::ApiError;
use crate::http::extractors::auth::AuthIdentity;
use crate::http::handlers::parse_uuid;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub skills: Option<Vec<String>>,
}

/// Query parameters for the agronomist directory.
#[derive(Debug, Deserialize)]
pub struct AgronomistSearchQuery {
    pub q: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// Integer minor units (cents).
    pub amount: i64,
}

/// GET /api/v1/identities/me - The caller's own account.
pub async fn me(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity = state.identity_service.get(&auth.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(identity, request_id, elapsed)))
}

/// PATCH /api/v1/identities/me - Apply profile edits.
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity = state
        .identity_service
        .update_profile(
            &auth.id,
            ProfileUpdate {
                name: body.name,
                phone: body.phone,
                bio: body.bio,
                location: body.location,
                skills: body.skills,
            },
        )
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(identity, request_id, elapsed)))
}

/// GET /api/v1/identities/{id} - Account by id.
pub async fn get_identity(
    State(state): State<AppState>,
    _auth: AuthIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Identity>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity_id = parse_uuid(&id)?;
    let identity = state.identity_service.get(&identity_id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(identity, request_id, elapsed)))
}

/// GET /api/v1/agronomists - Directory search.
pub async fn search_agronomists(
    State(state): State<AppState>,
    _auth: AuthIdentity,
    Query(query): Query<AgronomistSearchQuery>,
) -> Result<Json<ApiResponse<Vec<Identity>>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let results = state
        .identity_service
        .search_agronomists(query.q.as_deref(), query.location.as_deref())
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(results, request_id, elapsed)))
}

/// POST /api/v1/identities/me/withdraw - Agronomist payout.
pub async fn withdraw(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(body): Json<WithdrawRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let balance = state.identity_service.withdraw(&auth.id, body.amount).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "balance": balance }),
        request_id,
        elapsed,
    )))
}
