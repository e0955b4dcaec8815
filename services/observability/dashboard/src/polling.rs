//! Polling Update Channel
//!
//! One recurring timer per subscription. On each tick the [`UpdateSource`] is
//! asked which categories changed since the subscription's last successful
//! check, and every category the subscription is interested in is delivered
//! to its callback as an [`UpdateEvent`].
//!
//! Ticks follow a fixed schedule: a slow callback or source delays the next
//! poll but the timer is not re-armed relative to completion, and missed
//! ticks are not coalesced.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashboard_config::{clamp_polling_interval, ClientConfig};
use network::{EnhancedError, TransportPipeline};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use types::{QueryParams, QueryValue, UpdateEvent, UpdateType};
use uuid::Uuid;

/// New data reported for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryUpdate {
    #[serde(rename = "type")]
    pub update_type: UpdateType,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl CategoryUpdate {
    pub fn new(update_type: UpdateType, data: Option<serde_json::Value>) -> Self {
        Self { update_type, data }
    }
}

/// Reports which update categories have new data
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Categories among `interests` with data newer than `since`
    async fn poll(
        &self,
        interests: &[UpdateType],
        since: DateTime<Utc>,
    ) -> Result<Vec<CategoryUpdate>, EnhancedError>;
}

#[derive(Debug, Default, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    updates: Vec<CategoryUpdate>,
}

/// Update source backed by `GET /updates/?since=<iso>&types=<csv>`
#[derive(Debug, Clone)]
pub struct HttpUpdateSource {
    pipeline: TransportPipeline,
    path: String,
}

impl HttpUpdateSource {
    pub const DEFAULT_PATH: &'static str = "/updates";

    pub fn new(pipeline: TransportPipeline) -> Self {
        Self::with_path(pipeline, Self::DEFAULT_PATH)
    }

    pub fn with_path(pipeline: TransportPipeline, path: impl Into<String>) -> Self {
        Self {
            pipeline,
            path: path.into(),
        }
    }
}

#[async_trait]
impl UpdateSource for HttpUpdateSource {
    async fn poll(
        &self,
        interests: &[UpdateType],
        since: DateTime<Utc>,
    ) -> Result<Vec<CategoryUpdate>, EnhancedError> {
        let mut query = QueryParams::new();
        query.insert("since".to_string(), QueryValue::from(since));
        query.insert(
            "types".to_string(),
            QueryValue::from(interests.iter().map(UpdateType::as_str).collect::<Vec<_>>()),
        );

        let response: UpdatesResponse = self.pipeline.get_json(&self.path, query).await?;
        Ok(response.updates)
    }
}

/// What a subscriber wants and where to deliver it
pub struct SubscribeOptions {
    pub update_types: Vec<UpdateType>,
    /// Tick period; the channel default when `None`. Clamped to the polling bounds.
    pub interval: Option<Duration>,
    on_update: Arc<dyn Fn(UpdateEvent) + Send + Sync>,
}

impl SubscribeOptions {
    pub fn new(
        update_types: Vec<UpdateType>,
        on_update: impl Fn(UpdateEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            update_types,
            interval: None,
            on_update: Arc::new(on_update),
        }
    }

    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

type Registry = Arc<Mutex<HashMap<Uuid, Vec<UpdateType>>>>;

/// Handle for one active subscription.
///
/// Dropping the handle stops its timer; [`unsubscribe`](Self::unsubscribe)
/// does the same explicitly.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    task: JoinHandle<()>,
    registry: Registry,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling; same as dropping the handle
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
        let mut registry = self.registry.lock();
        if registry.remove(&self.id).is_some() {
            info!(
                "Removed subscription {}, active subscriptions: {}",
                self.id,
                registry.len()
            );
        }
    }
}

/// Timer-driven delivery of categorized update notifications
pub struct PollingChannel {
    source: Arc<dyn UpdateSource>,
    default_interval: Duration,
    subscriptions: Registry,
}

impl PollingChannel {
    pub fn new(source: Arc<dyn UpdateSource>, default_interval: Duration) -> Self {
        Self {
            source,
            default_interval: clamp(default_interval),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(source: Arc<dyn UpdateSource>, config: &ClientConfig) -> Self {
        Self::new(source, config.polling_interval())
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    /// Start polling for `options.update_types`.
    ///
    /// The first tick fires one interval after subscribing.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, since the polling timer
    /// is spawned onto the current one.
    pub fn subscribe(&self, options: SubscribeOptions) -> Subscription {
        let id = Uuid::new_v4();
        let period = options.interval.map(clamp).unwrap_or(self.default_interval);
        let interests = options.update_types;
        let on_update = options.on_update;
        let source = Arc::clone(&self.source);

        {
            let mut registry = self.subscriptions.lock();
            registry.insert(id, interests.clone());
            info!(
                "Added subscription {} for {:?} every {:?}, active subscriptions: {}",
                id,
                interests,
                period,
                registry.len()
            );
        }

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut since = Utc::now();

            loop {
                ticker.tick().await;
                let checked_at = Utc::now();

                let updates = match source.poll(&interests, since).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        warn!("Subscription {} skipped a tick: {}", id, e);
                        continue;
                    }
                };
                since = checked_at;

                for update in updates {
                    if !interests.iter().any(|interest| interest.matches(update.update_type)) {
                        continue;
                    }
                    debug!("Subscription {} received {}", id, update.update_type);
                    on_update(UpdateEvent::new(update.update_type, update.data));
                }
            }
        });

        Subscription {
            id,
            task,
            registry: Arc::clone(&self.subscriptions),
        }
    }

    /// Number of live subscriptions
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }
}

fn clamp(interval: Duration) -> Duration {
    clamp_polling_interval(u64::try_from(interval.as_millis()).unwrap_or(u64::MAX))
}
