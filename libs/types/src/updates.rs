//! Update categories and events delivered by the polling channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Category of data a dashboard surface can be notified about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateType {
    Events,
    SecurityAlerts,
    PerformanceMetrics,
    Agents,
    /// Wildcard: a subscription for `All` matches every category
    All,
}

impl UpdateType {
    /// Every concrete category (excludes the `All` wildcard)
    pub const CATEGORIES: [UpdateType; 4] = [
        UpdateType::Events,
        UpdateType::SecurityAlerts,
        UpdateType::PerformanceMetrics,
        UpdateType::Agents,
    ];

    /// Wire name of the category
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateType::Events => "EVENTS",
            UpdateType::SecurityAlerts => "SECURITY_ALERTS",
            UpdateType::PerformanceMetrics => "PERFORMANCE_METRICS",
            UpdateType::Agents => "AGENTS",
            UpdateType::All => "ALL",
        }
    }

    /// Check whether a subscription for `self` wants updates of `category`
    pub fn matches(&self, category: UpdateType) -> bool {
        *self == UpdateType::All || category == UpdateType::All || *self == category
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown update category name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown update type: {0}")]
pub struct ParseUpdateTypeError(pub String);

impl FromStr for UpdateType {
    type Err = ParseUpdateTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "EVENTS" => Ok(UpdateType::Events),
            "SECURITY_ALERTS" => Ok(UpdateType::SecurityAlerts),
            "PERFORMANCE_METRICS" => Ok(UpdateType::PerformanceMetrics),
            "AGENTS" => Ok(UpdateType::Agents),
            "ALL" => Ok(UpdateType::All),
            _ => Err(ParseUpdateTypeError(s.to_string())),
        }
    }
}

/// A single notification produced on a polling tick.
///
/// Ephemeral: delivered to the subscriber's callback and not retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl UpdateEvent {
    /// Create an event stamped with the current time
    pub fn new(update_type: UpdateType, data: Option<serde_json::Value>) -> Self {
        Self {
            update_type,
            timestamp: Utc::now(),
            data,
        }
    }
}
