//! Typed application configuration.
//!
//! Loaded from `config.toml` by `agrilink-infra`; every section falls back
//! to defaults when missing. Secrets (the JWT signing key) prefer the
//! `AGRILINK_JWT_SECRET` environment variable over the file.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
    pub auth: AuthConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Database location. `None` resolves to `{data_dir}/agrilink.db`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

/// Which payment gateway implementation to wire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Mock,
    Remote,
}

impl Default for GatewayKind {
    fn default() -> Self {
        GatewayKind::Mock
    }
}

/// Payment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Percentage of a consultation price retained by the platform,
    /// integer percent.
    pub fee_percent: u32,
    pub gateway: GatewayKind,
    /// Endpoint for the remote gateway; required when `gateway = "remote"`.
    pub remote_endpoint: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            fee_percent: 10,
            gateway: GatewayKind::Mock,
            remote_endpoint: None,
        }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing key. Overridden by `AGRILINK_JWT_SECRET` when set.
    pub jwt_secret: Option<String>,
    pub token_ttl_minutes: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: 60,
        }
    }
}
