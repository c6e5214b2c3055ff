//! Configuration for the Materializer

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one materialize pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterializerConfig {
    /// Maximum chunk size (characters); a single unsplittable slice is the
    /// only allowed exception
    pub max_chunk_chars: usize,

    /// Maximum chunks kept per document; the list is truncated beyond this
    pub max_chunks: usize,

    /// Hard deadline for the binary fetch (milliseconds)
    pub fetch_timeout_ms: u64,

    /// Byte cap for the fetched binary; streaming aborts once crossed
    pub max_fetch_bytes: usize,
}

impl MaterializerConfig {
    /// Get the fetch deadline as a Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_chunk_chars == 0 {
            return Err("max_chunk_chars must be greater than 0".to_string());
        }
        if self.max_chunks == 0 {
            return Err("max_chunks must be greater than 0".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be greater than 0".to_string());
        }
        if self.max_fetch_bytes == 0 {
            return Err("max_fetch_bytes must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: 4_000,
            max_chunks: 400,
            fetch_timeout_ms: 20_000,
            max_fetch_bytes: 25 * 1024 * 1024,
        }
    }
}
