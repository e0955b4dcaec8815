//! # Dashboard Data Types
//!
//! Shared data model for the dashboard data-access layer.
//!
//! ## Contents
//!
//! - **Query values**: typed request parameters and their wire formatting
//!   (arrays joined with commas, objects as JSON, dates as ISO-8601)
//! - **Update events**: categories and payloads pushed by the polling channel
//! - **Pagination**: sort order, derived request parameters and the server page envelope
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use types::{format_request_params, QueryValue};
//!
//! let mut params = BTreeMap::new();
//! params.insert("agents".to_string(), QueryValue::from(vec!["001", "002"]));
//! params.insert("limit".to_string(), QueryValue::from(50));
//!
//! let formatted = format_request_params(&params);
//! assert_eq!(formatted["agents"], "001,002");
//! assert_eq!(formatted["limit"], "50");
//! ```

pub mod pagination;
pub mod query;
pub mod updates;

pub use pagination::{Page, PaginationParams, ParseSortOrderError, SortOrder};
pub use query::{format_request_params, QueryParams, QueryValue};
pub use updates::{ParseUpdateTypeError, UpdateEvent, UpdateType};
