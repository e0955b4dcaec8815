//! Client Configuration Module
//!
//! Provides configuration loading for the dashboard data-access layer.
//! Supports loading from TOML files with environment-specific overrides
//! and `DASHBOARD_*` environment variables.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration consumed by the transport pipeline, operation controllers
/// and polling channel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://localhost:8000`
    pub base_url: String,

    /// Versioned API prefix appended to `base_url`
    pub api_prefix: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Maximum automatic retries after the first attempt
    pub max_retries: u32,

    /// Exponential backoff base in milliseconds
    pub retry_base_delay_ms: u64,

    /// Default polling interval in milliseconds
    pub polling_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::transport::BASE_URL.to_string(),
            api_prefix: defaults::transport::API_PREFIX.to_string(),
            timeout_ms: defaults::transport::TIMEOUT_MS,
            max_retries: defaults::retry::MAX_RETRIES,
            retry_base_delay_ms: defaults::retry::BASE_DELAY_MS,
            polling_interval_ms: defaults::polling::INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    /// Load configuration from files with environment overrides.
    ///
    /// Sources, lowest precedence first: built-in defaults, `base_path`
    /// (required when given, otherwise `config/dashboard.toml` if present),
    /// `config/environments/<environment>.toml`, then `DASHBOARD_*` variables.
    pub fn load(base_path: Option<&Path>, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        builder = match base_path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder.add_source(File::with_name("config/dashboard").required(false)),
        };

        if let Some(env) = environment {
            let env_file = PathBuf::from("config/environments").join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // DASHBOARD_BASE_URL, DASHBOARD_MAX_RETRIES, ...
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut config: ClientConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.expand_env_vars()?;
        config.validate()?;

        debug!("Loaded client configuration: {:?}", config);
        Ok(config)
    }

    /// Expand environment variables in the base URL (`${BACKEND_HOST}` etc.)
    pub fn expand_env_vars(&mut self) -> Result<()> {
        let expanded =
            shellexpand::env(&self.base_url).context("Failed to expand base URL")?;
        self.base_url = expanded.to_string();
        Ok(())
    }

    /// Reject values the transport cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            );
        }

        if self.timeout_ms == 0 {
            bail!("timeout_ms must be greater than zero");
        }

        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            bail!("api_prefix must start with '/', got: {}", self.api_prefix);
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Default polling interval, clamped into the supported range
    pub fn polling_interval(&self) -> Duration {
        clamp_polling_interval(self.polling_interval_ms)
    }
}

/// Clamp a requested polling interval into `[5s, 60s]`
pub fn clamp_polling_interval(interval_ms: u64) -> Duration {
    Duration::from_millis(interval_ms.clamp(
        defaults::polling::MIN_INTERVAL_MS,
        defaults::polling::MAX_INTERVAL_MS,
    ))
}

/// Convenience function to load configuration with defaults
pub fn load_config(environment: Option<&str>) -> Result<ClientConfig> {
    ClientConfig::load(None, environment)
}
