//! Application configuration loader.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`AppConfig`]. Falls back to defaults when the file is missing or
//! malformed. The JWT signing key prefers the `AGRILINK_JWT_SECRET`
//! environment variable over the file, so the secret can stay out of
//! config files entirely.

use std::path::Path;

use agrilink_types::config::AppConfig;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                "No config.toml found at {}, using defaults",
                config_path.display()
            );
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!(
                "Failed to read {}: {err}, using defaults",
                config_path.display()
            );
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Resolve the JWT signing key: environment first, config file second.
pub fn resolve_jwt_secret(config: &AppConfig) -> Option<String> {
    std::env::var("AGRILINK_JWT_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| config.auth.jwt_secret.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.payment.fee_percent, 10);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 9000

[payment]
fee_percent = 15

[auth]
jwt_secret = "file-secret"
token_ttl_minutes = 120
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.payment.fee_percent, 15);
        assert_eq!(config.auth.token_ttl_minutes, 120);
        assert_eq!(config.auth.jwt_secret.as_deref(), Some("file-secret"));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.server.port, 8000);
    }
}
