//! Consultation handlers.
//!
//! Endpoints:
//! - POST  /api/v1/consultations               - Farmer books a consultation
//! - GET   /api/v1/consultations               - List for the caller
//! - PATCH /api/v1/consultations/{id}          - Status/notes update
//! - POST  /api/v1/consultations/{id}/pay/mock - Simulate payment capture

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use agrilink_core::consultation::service::NewConsultation;
use agrilink_types::consultation::{Consultation, ConsultationStatus};
use agrilink_types::error::ConsultationError;
use agrilink_types::identity::Role;

use crate::http::error::ApiError;
use crate::http::extractors::auth::AuthIdentity;
use crate::http::handlers::parse_uuid;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateConsultationRequest {
    pub agronomist_id: Uuid,
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Integer minor units (cents).
    pub price: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ConsultationStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /api/v1/consultations - Farmer books a consultation.
pub async fn create_consultation(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(body): Json<CreateConsultationRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    if auth.role != Role::Farmer {
        return Err(ConsultationError::Forbidden.into());
    }

    let (consultation, checkout) = state
        .consultation_service
        .create(
            auth.id,
            NewConsultation {
                agronomist_id: body.agronomist_id,
                topic: body.topic,
                description: body.description,
                scheduled_at: body.scheduled_at,
                price: body.price,
            },
        )
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "consultation": consultation, "checkout": checkout }),
        request_id,
        elapsed,
    )))
}

/// GET /api/v1/consultations - List for the caller (admins see all).
pub async fn list_consultations(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<ApiResponse<Vec<Consultation>>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let consultations = state
        .consultation_service
        .list_for(&auth.id, auth.role)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        consultations,
        request_id,
        elapsed,
    )))
}

/// PATCH /api/v1/consultations/{id} - Status/notes update.
pub async fn update_consultation(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<Consultation>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let consultation_id = parse_uuid(&id)?;
    let consultation = state
        .consultation_service
        .update_status(&consultation_id, &auth.id, auth.role, body.status, body.notes)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        consultation,
        request_id,
        elapsed,
    )))
}

/// POST /api/v1/consultations/{id}/pay/mock - Simulate payment capture,
/// standing in for a real payment-gateway webhook.
pub async fn pay_mock(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Consultation>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let consultation_id = parse_uuid(&id)?;
    let consultation = state
        .consultation_service
        .capture_mock(&consultation_id, &auth.id, auth.role)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        consultation,
        request_id,
        elapsed,
    )))
}
