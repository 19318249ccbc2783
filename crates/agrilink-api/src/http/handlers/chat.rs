//! Chat handlers.
//!
//! Endpoints:
//! - GET   /api/v1/chat                        - Thread list for the caller
//! - GET   /api/v1/chat/{id}                   - Thread with full history
//! - POST  /api/v1/chat/consultation/{id}      - Find-or-create the thread
//! - POST  /api/v1/chat/{id}/messages          - Append a message
//! - PATCH /api/v1/chat/{id}/messages/read     - Mark thread read
//!
//! Appending publishes `newMessage` to the thread's subscribed realtime
//! connections after the store commits, so delivery order follows commit
//! order within a thread.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use agrilink_types::chat::{ChatMessage, MessageType, ThreadDetail, ThreadSummary};
use agrilink_types::event::ServerEvent;

use crate::http::error::ApiError;
use crate::http::extractors::auth::AuthIdentity;
use crate::http::handlers::parse_uuid;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub file_ref: Option<String>,
}

/// GET /api/v1/chat - Active threads for the caller, most recent first.
pub async fn list_chats(
    State(state): State<AppState>,
    auth: AuthIdentity,
) -> Result<Json<ApiResponse<Vec<ThreadSummary>>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let threads = state.chat_store.list_threads_for(&auth.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(threads, request_id, elapsed)))
}

/// GET /api/v1/chat/{id} - One thread with history, participants populated.
pub async fn get_chat(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ThreadDetail>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let thread_id = parse_uuid(&id)?;
    let detail = state.chat_store.get_thread(&thread_id, &auth.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(detail, request_id, elapsed)))
}

/// POST /api/v1/chat/consultation/{id} - Find-or-create the consultation's
/// thread. Idempotent under concurrent first access by both parties.
pub async fn get_or_create_chat(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ThreadDetail>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let consultation_id = parse_uuid(&id)?;
    let detail = state
        .thread_binder
        .get_or_create_thread(&consultation_id, &auth.id)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(detail, request_id, elapsed)))
}

/// POST /api/v1/chat/{id}/messages - Append and fan out a message.
pub async fn post_message(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
    Json(body): Json<PostMessageRequest>,
) -> Result<Json<ApiResponse<ChatMessage>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let thread_id = parse_uuid(&id)?;
    let message = state
        .chat_store
        .append_message(
            &thread_id,
            &auth.id,
            body.content,
            body.message_type,
            body.file_ref,
        )
        .await?;

    state.presence.publish_to_thread(
        &thread_id,
        ServerEvent::NewMessage {
            message: message.clone(),
        },
    );

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(message, request_id, elapsed)))
}

/// PATCH /api/v1/chat/{id}/messages/read - Add the caller's read receipts
/// to every unread message. Idempotent.
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthIdentity,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let thread_id = parse_uuid(&id)?;
    let added = state.chat_store.mark_read(&thread_id, &auth.id).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "marked_read": added }),
        request_id,
        elapsed,
    )))
}
