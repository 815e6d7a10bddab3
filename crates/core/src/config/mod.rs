//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SUBRELAY_*)
//! 2. TOML config file (if SUBRELAY_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SUBRELAY_*)
/// 2. TOML config file (if SUBRELAY_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Socket address the HTTP server listens on.
    ///
    /// Set via SUBRELAY_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SUBRELAY_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Identification header sent when the caller does not choose one.
    ///
    /// Set via SUBRELAY_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for subscription fetches in milliseconds.
    ///
    /// Set via SUBRELAY_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Timeout for conversion endpoint calls in milliseconds.
    ///
    /// Set via SUBRELAY_CONVERT_TIMEOUT_MS environment variable.
    #[serde(default = "default_convert_timeout_ms")]
    pub convert_timeout_ms: u64,

    /// Maximum bytes accepted from any upstream body.
    ///
    /// Set via SUBRELAY_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Number of secondary subscriptions fetched in parallel.
    ///
    /// Set via SUBRELAY_MAX_CONCURRENCY environment variable.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Conversion endpoint used when the caller does not supply one.
    ///
    /// Set via SUBRELAY_CONVERTER_URL environment variable.
    #[serde(default = "default_converter_url")]
    pub converter_url: String,

    /// Externally reachable base URL of this relay.
    ///
    /// Set via SUBRELAY_PUBLIC_BASE_URL environment variable.
    /// Required only to convert `key://` subscriptions.
    #[serde(default)]
    pub public_base_url: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:6789".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./subrelay-cache.sqlite")
}

fn default_user_agent() -> String {
    "clash-verge/v2.4.3".into()
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_convert_timeout_ms() -> u64 {
    60_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_max_concurrency() -> usize {
    4
}

fn default_converter_url() -> String {
    "http://127.0.0.1:25500/sub".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            convert_timeout_ms: default_convert_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_concurrency: default_max_concurrency(),
            converter_url: default_converter_url(),
            public_base_url: None,
        }
    }
}

impl AppConfig {
    /// Subscription fetch timeout as Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Conversion call timeout as Duration.
    pub fn convert_timeout(&self) -> Duration {
        Duration::from_millis(self.convert_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SUBRELAY_`
    /// 2. TOML file from `SUBRELAY_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SUBRELAY_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("SUBRELAY_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into()),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Base URL the converter can use to read a cached subscription back.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the public base URL is not set.
    pub fn require_public_base_url(&self) -> Result<&str, ConfigError> {
        self.public_base_url
            .as_deref()
            .map(|base| base.trim_end_matches('/'))
            .ok_or_else(|| ConfigError::Missing {
                field: "public_base_url".into(),
                hint: "Set SUBRELAY_PUBLIC_BASE_URL environment variable".into(),
            })
    }
}
