//! Checkout configuration

use crate::error::PaymentError;
use serde::{Deserialize, Serialize};

/// Settings for the hosted checkout provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Provider endpoint that creates hosted checkout sessions
    pub endpoint: String,

    /// How long a minted purchase token stays claimable (seconds)
    pub token_ttl_secs: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pay.example.org/v1/sessions".to_string(),
            token_ttl_secs: 900,
        }
    }
}

impl CheckoutConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.endpoint.is_empty() {
            return Err(PaymentError::Config(
                "checkout endpoint must not be empty".to_string(),
            ));
        }
        if self.token_ttl_secs == 0 {
            return Err(PaymentError::Config(
                "token_ttl_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, PaymentError> {
        let config: Self =
            toml::from_str(content).map_err(|e| PaymentError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CheckoutConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = CheckoutConfig {
            token_ttl_secs: 0,
            ..CheckoutConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = CheckoutConfig::from_toml("endpoint = \"https://pay.test/v1\"").unwrap();
        assert_eq!(config.endpoint, "https://pay.test/v1");
        assert_eq!(config.token_ttl_secs, 900);
    }
}
