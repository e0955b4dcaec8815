//! Integration Tests for the Async Operation Controller
//!
//! Runs on a paused clock so backoff delays are observed exactly:
//! - bounded controller-level retry and terminal error state
//! - non-retryable failures settling after one invocation
//! - duplicate execute suppression and superseded-run discarding
//! - reset, drop and dependency changes cancelling pending retries

use dashboard_data::{AsyncOperation, OperationOptions, OperationStatus};
use network::{normalize, EnhancedError, ErrorKind, RawFailure, RetryPolicy};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Records when the wrapped operation is invoked
#[derive(Clone, Default)]
struct CallLog {
    invocations: Arc<Mutex<Vec<Instant>>>,
}

impl CallLog {
    fn record(&self) -> usize {
        let mut invocations = self.invocations.lock();
        invocations.push(Instant::now());
        invocations.len()
    }

    fn count(&self) -> usize {
        self.invocations.lock().len()
    }

    fn gaps(&self) -> Vec<Duration> {
        let invocations = self.invocations.lock();
        invocations
            .windows(2)
            .map(|pair| pair[1].duration_since(pair[0]))
            .collect()
    }
}

fn timeout() -> EnhancedError {
    normalize(RawFailure::Timeout("10000ms".into()), None)
}

fn http(status: u16) -> EnhancedError {
    normalize(
        RawFailure::Status {
            status,
            body: String::new(),
        },
        None,
    )
}

fn policy() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(1_000))
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
    let count = Arc::new(AtomicUsize::new(0));
    let reader = Arc::clone(&count);
    (count, move || reader.load(Ordering::SeqCst))
}

fn assert_backoff(gaps: &[Duration], expected_ms: &[u64]) {
    assert_eq!(gaps.len(), expected_ms.len(), "gaps: {:?}", gaps);
    for (gap, expected) in gaps.iter().zip(expected_ms) {
        let expected = Duration::from_millis(*expected);
        assert!(
            *gap >= expected && *gap <= expected + Duration::from_millis(5),
            "expected ~{:?}, got {:?}",
            expected,
            gap
        );
    }
}

fn always_timing_out(calls: &CallLog, options: OperationOptions<u32>) -> AsyncOperation<u32> {
    let calls = calls.clone();
    AsyncOperation::new(
        move || {
            calls.record();
            async { Err::<u32, _>(timeout()) }
        },
        options,
    )
}

#[tokio::test(start_paused = true)]
async fn test_persistent_timeout_settles_after_max_retries() {
    let calls = CallLog::default();
    let (errors, error_count) = counter();
    let operation = always_timing_out(
        &calls,
        OperationOptions::new("timeouts")
            .with_retry(policy())
            .on_error(move |_| {
                errors.fetch_add(1, Ordering::SeqCst);
            }),
    );

    operation.execute(false).await;

    let state = operation.state();
    assert_eq!(state.status(), OperationStatus::Retrying);
    assert_eq!(state.retry_count, 1);
    assert!(state.error.is_none());

    let state = operation.settled().await;

    assert_eq!(calls.count(), 3);
    assert_backoff(&calls.gaps(), &[1_000, 2_000]);
    assert_eq!(state.status(), OperationStatus::Error);
    assert_eq!(state.retry_count, 2);
    assert_eq!(
        state.error.as_ref().map(|e| e.error_code()),
        Some(ErrorKind::Timeout)
    );
    assert_eq!(error_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_settles_after_one_invocation() {
    let calls = CallLog::default();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                calls.record();
                async { Err::<u32, _>(http(404)) }
            },
            OperationOptions::new("missing").with_retry(policy()),
        )
    };

    operation.execute(false).await;
    let state = operation.state();

    assert_eq!(state.status(), OperationStatus::Error);
    assert_eq!(state.retry_count, 0);
    assert!(!state.is_retrying);
    assert_eq!(
        state.error.as_ref().map(|e| e.error_code()),
        Some(ErrorKind::Http(404))
    );

    sleep(Duration::from_secs(30)).await;
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_resets_retry_count() {
    let calls = CallLog::default();
    let (successes, success_count) = counter();
    let (errors, error_count) = counter();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                let attempt = calls.record();
                async move {
                    if attempt == 1 {
                        Err(http(503))
                    } else {
                        Ok(42_u32)
                    }
                }
            },
            OperationOptions::new("flaky")
                .with_retry(policy())
                .on_success(move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                }),
        )
    };

    operation.execute(false).await;
    let state = operation.settled().await;

    assert_eq!(state.data, Some(42));
    assert_eq!(state.retry_count, 0);
    assert!(state.error.is_none());
    assert_eq!(state.status(), OperationStatus::Success);
    assert_eq!(calls.count(), 2);
    assert_backoff(&calls.gaps(), &[1_000]);
    assert_eq!(success_count(), 1);
    assert_eq!(error_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_execute_while_loading_is_ignored() {
    let calls = CallLog::default();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                calls.record();
                async {
                    sleep(Duration::from_millis(100)).await;
                    Ok::<_, EnhancedError>(1_u32)
                }
            },
            OperationOptions::new("slow"),
        )
    };

    tokio::join!(operation.execute(false), operation.execute(false));

    assert_eq!(calls.count(), 1);
    assert_eq!(operation.state().data, Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_forced_execute_discards_superseded_result() {
    let calls = CallLog::default();
    let (successes, success_count) = counter();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                let attempt = calls.record();
                async move {
                    // The first run resolves last
                    let (delay, value) = if attempt == 1 { (300, "stale") } else { (100, "fresh") };
                    sleep(Duration::from_millis(delay)).await;
                    Ok::<_, EnhancedError>(value.to_string())
                }
            },
            OperationOptions::new("search").on_success(move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }),
        )
    };

    tokio::join!(operation.execute(false), async {
        sleep(Duration::from_millis(10)).await;
        operation.execute(true).await;
    });

    assert_eq!(calls.count(), 2);
    assert_eq!(operation.state().data.as_deref(), Some("fresh"));
    assert!(!operation.state().loading);
    assert_eq!(success_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reset_cancels_pending_retry() {
    let calls = CallLog::default();
    let operation = always_timing_out(&calls, OperationOptions::new("reset").with_retry(policy()));

    operation.execute(false).await;
    assert!(operation.state().is_retrying);

    operation.reset();
    let state = operation.state();
    assert_eq!(state.status(), OperationStatus::Idle);
    assert_eq!(state.retry_count, 0);
    assert!(state.data.is_none() && state.error.is_none());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.count(), 1);
    assert_eq!(operation.status(), OperationStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_manual_execute_restarts_retry_budget() {
    let calls = CallLog::default();
    let operation = always_timing_out(&calls, OperationOptions::new("manual").with_retry(policy()));

    operation.execute(false).await;
    assert_eq!(operation.state().retry_count, 1);

    // Not loading while a retry is pending, so this runs and replaces it
    operation.execute(false).await;
    assert_eq!(operation.state().retry_count, 1);

    let state = operation.settled().await;
    assert_eq!(state.retry_count, 2);
    assert_eq!(calls.count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_pending_retry() {
    let calls = CallLog::default();
    let operation = always_timing_out(&calls, OperationOptions::new("dropped").with_retry(policy()));

    operation.execute(false).await;
    drop(operation);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(calls.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_mode_executes_on_creation() {
    let calls = CallLog::default();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                let attempt = calls.record();
                async move { Ok::<_, EnhancedError>(attempt) }
            },
            OperationOptions::new("overview").immediate(),
        )
    };

    assert_eq!(operation.status(), OperationStatus::Loading);

    let state = operation.settled().await;
    assert_eq!(state.data, Some(1));
    assert_eq!(calls.count(), 1);
}

fn immediate_counting(calls: &CallLog, successes: Arc<AtomicUsize>) -> AsyncOperation<usize> {
    let calls = calls.clone();
    AsyncOperation::new(
        move || {
            let attempt = calls.record();
            async move { Ok::<_, EnhancedError>(attempt) }
        },
        OperationOptions::new("overview")
            .immediate()
            .on_success(move |_| {
                successes.fetch_add(1, Ordering::SeqCst);
            }),
    )
}

#[tokio::test(start_paused = true)]
async fn test_immediate_run_is_discarded_when_dropped_before_start() {
    let calls = CallLog::default();
    let (successes, success_count) = counter();
    let operation = immediate_counting(&calls, successes);

    drop(operation);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(calls.count(), 0);
    assert_eq!(success_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_run_is_discarded_when_reset_before_start() {
    let calls = CallLog::default();
    let (successes, success_count) = counter();
    let operation = immediate_counting(&calls, successes);

    operation.reset();
    sleep(Duration::from_secs(1)).await;

    let state = operation.state();
    assert_eq!(state.status(), OperationStatus::Idle);
    assert!(state.data.is_none());
    assert_eq!(calls.count(), 0);
    assert_eq!(success_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_in_flight_result() {
    let calls = CallLog::default();
    let (successes, success_count) = counter();
    let (errors, error_count) = counter();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                calls.record();
                async {
                    sleep(Duration::from_millis(200)).await;
                    Ok::<_, EnhancedError>(1_u32)
                }
            },
            OperationOptions::new("slow")
                .on_success(move |_| {
                    successes.fetch_add(1, Ordering::SeqCst);
                })
                .on_error(move |_| {
                    errors.fetch_add(1, Ordering::SeqCst);
                }),
        )
    };

    tokio::join!(operation.execute(false), async {
        sleep(Duration::from_millis(50)).await;
        assert_eq!(operation.status(), OperationStatus::Loading);
        operation.reset();
    });

    let state = operation.state();
    assert_eq!(state.status(), OperationStatus::Idle);
    assert!(state.data.is_none());
    assert_eq!(calls.count(), 1);
    assert_eq!(success_count(), 0);
    assert_eq!(error_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_change_resets_and_refetches() {
    let calls = CallLog::default();
    let operation = {
        let calls = calls.clone();
        AsyncOperation::new(
            move || {
                let attempt = calls.record();
                async move { Ok::<_, EnhancedError>(attempt) }
            },
            OperationOptions::new("alerts").immediate(),
        )
    };
    operation.settled().await;

    // First call records the baseline
    assert!(!operation.update_dependencies(&(1_u32, "timestamp")).await);
    assert!(!operation.update_dependencies(&(1_u32, "timestamp")).await);
    assert_eq!(calls.count(), 1);

    assert!(operation.update_dependencies(&(2_u32, "timestamp")).await);
    assert_eq!(operation.state().data, Some(2));
    assert_eq!(calls.count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_change_without_immediate_only_resets() {
    let operation = AsyncOperation::new(
        || async { Ok::<_, EnhancedError>("page") },
        OperationOptions::new("lazy"),
    );
    operation.execute(false).await;
    assert_eq!(operation.status(), OperationStatus::Success);

    operation.update_dependencies("page=1").await;
    assert!(operation.update_dependencies("page=2").await);
    assert_eq!(operation.status(), OperationStatus::Idle);
}

#[tokio::test]
async fn test_subscribers_observe_transitions() {
    let operation = AsyncOperation::new(
        || async { Ok::<_, EnhancedError>(5_u8) },
        OperationOptions::new("watched"),
    );
    let mut receiver = operation.subscribe();
    assert!(!receiver.has_changed().unwrap());

    operation.execute(false).await;

    assert!(receiver.has_changed().unwrap());
    assert_eq!(receiver.borrow_and_update().data, Some(5));
}
