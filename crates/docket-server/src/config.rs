//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files: bind address, database path, webhook
//! secret, principal lists, and the per-component sections.

use docket_audit::EngineOptions;
use docket_domain::Tier;
use docket_materializer::MaterializerConfig;
use docket_payments::CheckoutConfig;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),

    /// A section failed validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// Path to the SQLite database file
    pub database_path: String,

    /// Shared secret for payment webhook signatures
    pub webhook_secret: String,

    /// Administrator allow-list (user ids)
    #[serde(default)]
    pub admin_users: Vec<String>,

    /// User ids with a stored free-access grant
    #[serde(default)]
    pub free_users: Vec<String>,

    /// Tier granted with free access; `basic` when unspecified
    #[serde(default)]
    pub free_tier: Option<Tier>,

    /// Checkout provider settings
    #[serde(default)]
    pub checkout: CheckoutConfig,

    /// Materialize pipeline settings
    #[serde(default)]
    pub materializer: MaterializerConfig,

    /// Audit engine caps and thresholds
    #[serde(default)]
    pub engine: EngineOptions,
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;

        if config.webhook_secret.is_empty() {
            return Err(ConfigError::MissingField("webhook_secret".to_string()));
        }
        config.checkout.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.materializer.validate().map_err(ConfigError::Invalid)?;
        config.engine.validate().map_err(ConfigError::Invalid)?;

        Ok(config)
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            database_path: ":memory:".to_string(),
            webhook_secret: "test-secret-do-not-use-in-production".to_string(),
            admin_users: Vec::new(),
            free_users: Vec::new(),
            free_tier: None,
            checkout: CheckoutConfig::default(),
            materializer: MaterializerConfig::default(),
            engine: EngineOptions::default(),
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default_test_config();
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(config.admin_users.is_empty());
        assert_eq!(config.engine.max_findings, 50);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            bind_address = "0.0.0.0"
            bind_port = 9000
            database_path = "/var/lib/docket/docket.db"
            webhook_secret = "whsec_abc"
            admin_users = ["ops-admin"]
            free_users = ["researcher-1"]
            free_tier = "pro"

            [checkout]
            endpoint = "https://pay.test/v1/sessions"
            token_ttl_secs = 600

            [materializer]
            max_chunk_chars = 2000
            max_chunks = 100
            fetch_timeout_ms = 5000
            max_fetch_bytes = 1048576

            [engine]
            max_findings = 20
            max_findings_per_category = 5
            max_evidence_per_finding = 2
            excerpt_max_chars = 120
            min_score = 3
        "#;

        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.bind_port, 9000);
        assert_eq!(config.admin_users, vec!["ops-admin"]);
        assert_eq!(config.free_tier, Some(Tier::Pro));
        assert_eq!(config.checkout.token_ttl_secs, 600);
        assert_eq!(config.materializer.max_chunks, 100);
        assert_eq!(config.engine.min_score, 3);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            database_path = "docket.db"
            webhook_secret = "whsec_abc"
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.materializer.max_chunk_chars, 4000);
        assert_eq!(config.checkout.token_ttl_secs, 900);
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        // Overriding one knob must not force spelling out the whole section.
        let toml = r#"
            bind_address = "127.0.0.1"
            bind_port = 8080
            database_path = "docket.db"
            webhook_secret = "whsec_abc"

            [engine]
            min_score = 4

            [materializer]
            max_chunks = 50
        "#;
        let config: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.engine.min_score, 4);
        assert_eq!(config.engine.max_findings, 50);
        assert_eq!(config.materializer.max_chunks, 50);
        assert_eq!(config.materializer.max_chunk_chars, 4000);
    }
}
