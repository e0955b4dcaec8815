//! # Dashboard Configuration
//!
//! Centralized configuration for the dashboard data-access layer.
//!
//! ## Features
//!
//! - **Transport settings**: base URL, versioned API prefix, request timeout
//! - **Retry settings**: bound and backoff base shared by both retry layers
//! - **Polling settings**: default interval, clamped to the supported range
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dashboard_config::ClientConfig;
//!
//! # fn main() -> anyhow::Result<()> {
//! // config/dashboard.toml (optional) + config/environments/staging.toml + DASHBOARD_* vars
//! let config = ClientConfig::load(None, Some("staging"))?;
//! println!("backend: {}{}", config.base_url, config.api_prefix);
//! # Ok(())
//! # }
//! ```

pub mod client_config;
pub mod defaults;

pub use client_config::{clamp_polling_interval, load_config, ClientConfig};
