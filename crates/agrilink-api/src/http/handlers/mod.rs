//! HTTP handlers.

pub mod auth;
pub mod chat;
pub mod consultation;
pub mod identity;
pub mod subscription;
pub mod ws;

use uuid::Uuid;

use crate::http::error::ApiError;

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
pub(crate) fn parse_uuid(s: &str) -> Result<Uuid, ApiError> {
    s.parse::<Uuid>()
        .map_err(|_| ApiError::Validation(format!("Invalid UUID: {s}")))
}
