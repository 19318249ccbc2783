//! Registration and login handlers.
//!
//! Endpoints (open, no bearer token):
//! - POST /api/v1/auth/register
//! - POST /api/v1/auth/login

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use agrilink_core::identity::service::NewIdentity;
use agrilink_types::identity::Role;

use crate::http::error::ApiError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/v1/auth/register - Create an account and issue a token.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity = state
        .identity_service
        .register(NewIdentity {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role,
            phone: body.phone,
        })
        .await?;

    let token = state.auth.sign(&identity)?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "identity": identity, "token": token }),
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/auth/login - Verify credentials and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let identity = state
        .identity_service
        .verify_credentials(&body.email, &body.password)
        .await?;

    let token = state.auth.sign(&identity)?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "identity": identity, "token": token }),
        request_id,
        elapsed,
    )))
}
