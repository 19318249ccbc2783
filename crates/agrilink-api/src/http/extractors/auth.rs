//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs carrying the identity id and role. The resolved
//! identity-and-role value is extracted once at the boundary and passed
//! explicitly into every component call, never re-derived per handler.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agrilink_types::identity::{Identity, Role};

use crate::http::error::ApiError;
use crate::state::AppState;

/// JWT claims: subject identity id, role, expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

/// Signing and verification keys derived from the configured secret.
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_minutes: u32,
}

impl AuthKeys {
    pub fn new(secret: &str, ttl_minutes: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_minutes,
        }
    }

    /// Issue a bearer token for an identity.
    pub fn sign(&self, identity: &Identity) -> Result<String, ApiError> {
        let claims = Claims {
            sub: identity.id.to_string(),
            role: identity.role.to_string(),
            exp: (Utc::now() + chrono::Duration::minutes(i64::from(self.ttl_minutes)))
                .timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))
    }

    /// Verify a bearer token and resolve the caller.
    pub fn verify(&self, token: &str) -> Result<AuthIdentity, ApiError> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())
            .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))?;

        let id = Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid token subject".to_string()))?;
        let role: Role = data
            .claims
            .role
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid token role".to_string()))?;

        Ok(AuthIdentity { id, role })
    }
}

/// The resolved caller: identity id and role, attached to the request at
/// the boundary.
#[derive(Debug, Clone, Copy)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub role: Role,
}

impl FromRequestParts<AppState> for AuthIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        state.auth.verify(&token)
    }
}

/// Extract the bearer token from the Authorization header.
fn extract_bearer(parts: &Parts) -> Result<String, ApiError> {
    let Some(auth) = parts.headers.get("authorization") else {
        return Err(ApiError::Unauthorized(
            "Missing Authorization header. Provide 'Authorization: Bearer <token>'.".to_string(),
        ));
    };

    let auth_str = auth.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header encoding".to_string())
    })?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) => Ok(token.trim().to_string()),
        None => Err(ApiError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        )),
    }
}
