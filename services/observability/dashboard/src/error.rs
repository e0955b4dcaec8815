//! Error types for dashboard data access setup

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Transport setup error: {0}")]
    Transport(#[from] network::ClientError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

pub type Result<T> = std::result::Result<T, DashboardError>;
