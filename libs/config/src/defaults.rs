//! Default configuration values
//!
//! Named defaults shared by the transport pipeline, the operation
//! controllers and the polling channel.

/// Transport defaults
pub mod transport {
    /// Backend base URL
    pub const BASE_URL: &str = "http://localhost:8000";

    /// Versioned API prefix appended to the base URL
    pub const API_PREFIX: &str = "/api/v1";

    /// Request timeout (milliseconds)
    pub const TIMEOUT_MS: u64 = 10_000;
}

/// Retry defaults, used by both the transport and operation layers
pub mod retry {
    /// Maximum automatic retries after the first attempt
    pub const MAX_RETRIES: u32 = 2;

    /// Backoff base (milliseconds); attempt `n` waits `base * 2^n`
    pub const BASE_DELAY_MS: u64 = 1_000;
}

/// Polling defaults
pub mod polling {
    /// Default polling interval (milliseconds)
    pub const INTERVAL_MS: u64 = 30_000;

    /// Fastest polling interval a consumer may request (milliseconds)
    pub const MIN_INTERVAL_MS: u64 = 5_000;

    /// Slowest polling interval a consumer may request (milliseconds)
    pub const MAX_INTERVAL_MS: u64 = 60_000;
}

/// Environment variable prefix for overrides (`DASHBOARD_BASE_URL`, ...)
pub const ENV_PREFIX: &str = "DASHBOARD";
