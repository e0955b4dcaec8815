//! Dashboard Data Access
//!
//! View-facing layer on top of the resilient transport pipeline:
//!
//! - [`AsyncOperation`]: fetch-and-track state machine with its own bounded
//!   retry, generation tokens for superseded runs and a `watch` state channel
//! - [`PaginationManager`]: page, size and sort state for one list view
//! - [`PollingChannel`]: timer-driven update notifications per subscription
//! - [`DashboardApi`]: typed service functions over the pipeline
//!
//! Retries compound: the pipeline retries each request per its
//! [`network::RetryPolicy`] and the controller retries the whole operation
//! per its own. Pass [`network::RetryPolicy::disabled`] to either side to
//! keep a single layer.

pub mod api;
pub mod error;
pub mod operation;
pub mod pagination;
pub mod polling;

pub use api::DashboardApi;
pub use error::{DashboardError, Result};
pub use operation::{
    AsyncOperation, OperationFuture, OperationOptions, OperationState, OperationStatus,
};
pub use pagination::PaginationManager;
pub use polling::{
    CategoryUpdate, HttpUpdateSource, PollingChannel, SubscribeOptions, Subscription,
    UpdateSource,
};
