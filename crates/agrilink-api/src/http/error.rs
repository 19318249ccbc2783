//! Application error type mapping to HTTP status codes and envelope format.
//!
//! Everything here is recovered at the request boundary; nothing is fatal
//! to the process. Unexpected persistence failures surface as a generic
//! internal error and the caller is told to retry.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use agrilink_types::error::{
    ChatError, ConsultationError, IdentityError, RepositoryError, SubscriptionError,
};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Identity/account errors.
    Identity(IdentityError),
    /// Consultation errors.
    Consultation(ConsultationError),
    /// Chat errors.
    Chat(ChatError),
    /// Subscription errors.
    Subscription(SubscriptionError),
    /// Authentication failure.
    Unauthorized(String),
    /// Validation error raised at the API boundary.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        ApiError::Identity(e)
    }
}

impl From<ConsultationError> for ApiError {
    fn from(e: ConsultationError) -> Self {
        ApiError::Consultation(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl From<SubscriptionError> for ApiError {
    fn from(e: SubscriptionError) -> Self {
        ApiError::Subscription(e)
    }
}

impl ApiError {
    /// (status, machine code, message) for the envelope.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Identity(e) => match e {
                IdentityError::NotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                IdentityError::EmailTaken(_) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
                IdentityError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", e.to_string())
                }
                IdentityError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string()),
                IdentityError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                IdentityError::Hashing(_) | IdentityError::Repository(_) => {
                    internal(e)
                }
            },
            ApiError::Consultation(e) => match e {
                ConsultationError::NotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                ConsultationError::Forbidden => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string())
                }
                ConsultationError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                ConsultationError::InvalidTransition { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_TRANSITION", e.to_string())
                }
                ConsultationError::Payment(_) | ConsultationError::Repository(_) => internal(e),
            },
            ApiError::Chat(e) => match e {
                ChatError::ThreadNotFound | ChatError::ConsultationNotFound => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
                }
                ChatError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string()),
                ChatError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                ChatError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT", e.to_string()),
                ChatError::Repository(_) => internal(e),
            },
            ApiError::Subscription(e) => match e {
                SubscriptionError::Forbidden => {
                    (StatusCode::FORBIDDEN, "FORBIDDEN", e.to_string())
                }
                SubscriptionError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                SubscriptionError::Payment(_) | SubscriptionError::Repository(_) => internal(e),
            },
            ApiError::Unauthorized(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
            }
            ApiError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

fn internal(e: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    // Details go to the log, not to the caller.
    tracing::error!("internal error: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Internal error, please retry".to_string(),
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

// Repository errors reaching the boundary directly are always internal.
impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        ApiError::Internal(e.to_string())
    }
}
