//! Integration Tests for the Polling Update Channel

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashboard_data::{CategoryUpdate, PollingChannel, SubscribeOptions, UpdateSource};
use network::{normalize, EnhancedError, RawFailure};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use types::{UpdateEvent, UpdateType};

type PollResult = Result<Vec<CategoryUpdate>, EnhancedError>;

/// Source that replays scripted poll results, then reports nothing new
#[derive(Default)]
struct FakeSource {
    script: Mutex<VecDeque<PollResult>>,
    polls: Mutex<Vec<(Vec<UpdateType>, DateTime<Utc>)>>,
}

impl FakeSource {
    fn scripted(script: Vec<PollResult>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            polls: Mutex::new(Vec::new()),
        })
    }

    fn poll_count(&self) -> usize {
        self.polls.lock().len()
    }
}

#[async_trait]
impl UpdateSource for FakeSource {
    async fn poll(&self, interests: &[UpdateType], since: DateTime<Utc>) -> PollResult {
        self.polls.lock().push((interests.to_vec(), since));
        let next = self.script.lock().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn collector() -> (Arc<Mutex<Vec<UpdateEvent>>>, impl Fn(UpdateEvent) + Send + Sync + 'static) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    (received, move |event| sink.lock().push(event))
}

fn channel(source: Arc<FakeSource>) -> PollingChannel {
    PollingChannel::new(source, Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn test_only_requested_categories_are_delivered() {
    let source = FakeSource::scripted(vec![Ok(vec![
        CategoryUpdate::new(UpdateType::Events, Some(json!({"new": 4}))),
        CategoryUpdate::new(UpdateType::Agents, None),
    ])]);
    let channel = channel(source.clone());
    let (received, on_update) = collector();

    let _subscription = channel.subscribe(SubscribeOptions::new(vec![UpdateType::Events], on_update));
    sleep(Duration::from_millis(5_001)).await;

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].update_type, UpdateType::Events);
    assert_eq!(received[0].data, Some(json!({"new": 4})));
    assert_eq!(source.polls.lock()[0].0, vec![UpdateType::Events]);
}

#[tokio::test(start_paused = true)]
async fn test_all_matches_every_category() {
    let source = FakeSource::scripted(vec![Ok(vec![
        CategoryUpdate::new(UpdateType::Events, None),
        CategoryUpdate::new(UpdateType::SecurityAlerts, None),
        CategoryUpdate::new(UpdateType::PerformanceMetrics, None),
    ])]);
    let channel = channel(source);
    let (received, on_update) = collector();

    let _subscription = channel.subscribe(SubscribeOptions::new(vec![UpdateType::All], on_update));
    sleep(Duration::from_millis(5_001)).await;

    let types: Vec<_> = received.lock().iter().map(|e| e.update_type).collect();
    assert_eq!(
        types,
        vec![
            UpdateType::Events,
            UpdateType::SecurityAlerts,
            UpdateType::PerformanceMetrics
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_ticks_follow_fixed_schedule() {
    let source = FakeSource::scripted(Vec::new());
    let channel = channel(source.clone());
    let (_received, on_update) = collector();

    let _subscription = channel.subscribe(SubscribeOptions::new(vec![UpdateType::Agents], on_update));

    sleep(Duration::from_millis(4_999)).await;
    assert_eq!(source.poll_count(), 0);

    sleep(Duration::from_millis(10_002)).await;
    assert_eq!(source.poll_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_tick_is_skipped() {
    let source = FakeSource::scripted(vec![
        Err(normalize(RawFailure::Timeout("10000ms".into()), None)),
        Ok(vec![CategoryUpdate::new(UpdateType::Agents, None)]),
    ]);
    let channel = channel(source.clone());
    let (received, on_update) = collector();

    let subscription = channel.subscribe(SubscribeOptions::new(vec![UpdateType::Agents], on_update));
    sleep(Duration::from_millis(10_001)).await;

    assert!(subscription.is_active());
    assert_eq!(received.lock().len(), 1);

    // The cursor only advances after a successful poll
    let polls = source.polls.lock();
    assert_eq!(polls.len(), 2);
    assert_eq!(polls[0].1, polls[1].1);
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_stops_the_timer() {
    let source = FakeSource::scripted(Vec::new());
    let channel = channel(source.clone());
    let (_received, on_update) = collector();

    let subscription = channel.subscribe(SubscribeOptions::new(vec![UpdateType::Events], on_update));
    assert_eq!(channel.active_subscriptions(), 1);

    sleep(Duration::from_millis(5_001)).await;
    assert_eq!(source.poll_count(), 1);

    subscription.unsubscribe();
    assert_eq!(channel.active_subscriptions(), 0);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(source.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_handle_stops_the_timer() {
    let source = FakeSource::scripted(Vec::new());
    let channel = channel(source.clone());

    {
        let (_received, on_update) = collector();
        let _subscription =
            channel.subscribe(SubscribeOptions::new(vec![UpdateType::Events], on_update));
    }

    sleep(Duration::from_secs(30)).await;
    assert_eq!(source.poll_count(), 0);
    assert_eq!(channel.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_requested_interval_is_clamped() {
    let source = FakeSource::scripted(Vec::new());
    let channel = channel(source.clone());
    let (_received, on_update) = collector();

    let _subscription = channel.subscribe(
        SubscribeOptions::new(vec![UpdateType::Events], on_update).every(Duration::from_millis(100)),
    );

    sleep(Duration::from_millis(4_900)).await;
    assert_eq!(source.poll_count(), 0);

    sleep(Duration::from_millis(101)).await;
    assert_eq!(source.poll_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_are_independent() {
    let source = FakeSource::scripted(Vec::new());
    let channel = channel(source.clone());
    let (_a, on_events) = collector();
    let (_b, on_agents) = collector();

    let events = channel.subscribe(SubscribeOptions::new(vec![UpdateType::Events], on_events));
    let agents = channel.subscribe(
        SubscribeOptions::new(vec![UpdateType::Agents], on_agents).every(Duration::from_secs(10)),
    );
    assert_ne!(events.id(), agents.id());
    assert_eq!(channel.active_subscriptions(), 2);

    sleep(Duration::from_millis(10_001)).await;
    // events at 5s and 10s, agents at 10s
    assert_eq!(source.poll_count(), 3);

    drop(events);
    assert_eq!(channel.active_subscriptions(), 1);
}
