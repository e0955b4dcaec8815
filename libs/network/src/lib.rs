//! Network Infrastructure
//!
//! Resilient HTTP transport for the dashboard backend. Every request goes
//! through one [`TransportPipeline`], which builds the URL, dispatches it via
//! an [`HttpBackend`], retries transient failures with exponential backoff,
//! and normalizes anything that still fails into an [`EnhancedError`].
//!
//! ```no_run
//! use dashboard_config::ClientConfig;
//! use network::TransportPipeline;
//! use types::QueryParams;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = TransportPipeline::from_config(&ClientConfig::default())?;
//! let agents: serde_json::Value = pipeline.get_json("/agents", QueryParams::new()).await?;
//! println!("{}", agents);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod request;
pub mod retry;
pub mod transports;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use normalizer::{normalize, EnhancedError, ErrorKind, RawFailure, RequestContext};
pub use pipeline::TransportPipeline;
pub use request::{collapse_version_prefix, normalize_path, RequestDescriptor};
pub use retry::{delay_for, should_retry, RetryPolicy};
pub use transports::{HttpBackend, HttpResponse, PreparedRequest, ReqwestBackend};

// Re-exported so callers can name methods without depending on reqwest
pub use reqwest::Method;
