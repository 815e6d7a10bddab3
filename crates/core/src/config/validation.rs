//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MIN_TIMEOUT_MS: u64 = 100;
const MAX_TIMEOUT_MS: u64 = 300_000;

fn check_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_TIMEOUT_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must be at least 100ms".into() });
    }
    if value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid { field: field.into(), reason: "must not exceed 5 minutes (300000ms)".into() });
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - either timeout is less than 100ms or exceeds 5 minutes
    /// - `convert_timeout_ms` is shorter than `fetch_timeout_ms`
    /// - `max_concurrency` is 0 or exceeds 16
    /// - `user_agent` or `converter_url` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        check_timeout("fetch_timeout_ms", self.fetch_timeout_ms)?;
        check_timeout("convert_timeout_ms", self.convert_timeout_ms)?;
        if self.convert_timeout_ms < self.fetch_timeout_ms {
            return Err(ConfigError::Invalid {
                field: "convert_timeout_ms".into(),
                reason: "must not be shorter than fetch_timeout_ms".into(),
            });
        }

        if self.max_concurrency == 0 || self.max_concurrency > 16 {
            return Err(ConfigError::Invalid { field: "max_concurrency".into(), reason: "must be between 1 and 16".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }
        if self.converter_url.is_empty() {
            return Err(ConfigError::Invalid { field: "converter_url".into(), reason: "must not be empty".into() });
        }

        if self.public_base_url.is_none() {
            tracing::warn!("public_base_url is not set; key:// subscriptions cannot be converted");
        }

        Ok(())
    }
}
