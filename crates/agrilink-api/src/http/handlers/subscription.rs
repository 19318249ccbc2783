//! Subscription handlers.
//!
//! Endpoints:
//! - POST /api/v1/subscriptions - Farmer subscribes to a plan
//! - GET  /api/v1/subscriptions - Caller's subscriptions

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use agrilink_core::subscription::service::NewSubscription;
use agrilink_types::subscription::Subscription;

use crate::http::error::ApiError;
use crate::http::extractors::auth::AuthIdentity;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub plan_id: String,
    /// Integer minor units (cents).
    pub price: i64,
    pub duration_days: u32,
}

/// POST /api/v1/subscriptions - Subscribe to a plan (farmers only).
pub async fn subscribe(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Json(body): Json<SubscribeRequest>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let outcome = state
        .subscription_service
        .subscribe(
            &auth.id,
            auth.role,
            NewSubscription {
                plan_id: body.plan_id,
                price: body.price,
                duration_days: body.duration_days,
            },
        )
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({
            "subscription": outcome.subscription,
            "checkout": outcome.checkout,
        }),
        request_id,
        elapsed,
    )))
}

/// GET /api/v1/subscriptions - The caller's subscriptions.
pub async fn list_subscriptions(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<ApiResponse<Vec<Subscription>>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let subscriptions = state.subscription_service.list_for(&auth.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        subscriptions,
        request_id,
        elapsed,
    )))
}
