//! Async Operation Controller
//!
//! Wraps one "fetch and track" operation in a small state machine:
//!
//! ```text
//! idle -> loading -> success
//!                 -> error (terminal)
//!                 -> retrying -> loading -> ...
//! ```
//!
//! State is published through a `watch` channel so any number of views can
//! observe the same controller. Every run carries a generation token; a run
//! superseded by a forced execute, a reset or the controller being dropped has
//! its result discarded and fires no callbacks.

use futures::future::{BoxFuture, FutureExt};
use network::{EnhancedError, RetryPolicy};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Boxed future produced by the wrapped operation
pub type OperationFuture<T> = BoxFuture<'static, Result<T, EnhancedError>>;

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&EnhancedError) + Send + Sync>;

/// Coarse phase of an operation, derived from its state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Idle,
    Loading,
    Success,
    Error,
    Retrying,
}

/// Observable snapshot of one controller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationState<T> {
    pub data: Option<T>,
    pub loading: bool,
    /// Terminal failure only; `None` while a retry is pending
    pub error: Option<EnhancedError>,
    /// Retries scheduled by this controller since the last manual execute
    pub retry_count: u32,
    pub is_retrying: bool,
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
            retry_count: 0,
            is_retrying: false,
        }
    }
}

impl<T> OperationState<T> {
    pub fn status(&self) -> OperationStatus {
        if self.loading {
            OperationStatus::Loading
        } else if self.is_retrying {
            OperationStatus::Retrying
        } else if self.error.is_some() {
            OperationStatus::Error
        } else if self.data.is_some() {
            OperationStatus::Success
        } else {
            OperationStatus::Idle
        }
    }

    /// Neither running nor waiting for a scheduled retry
    pub fn is_settled(&self) -> bool {
        !self.loading && !self.is_retrying
    }
}

/// Construction options for [`AsyncOperation`]
pub struct OperationOptions<T> {
    /// Name used in log lines
    pub label: String,
    /// Execute once as soon as the controller is created
    pub immediate: bool,
    /// Controller-level retry policy, stacked on top of the transport's
    pub retry: RetryPolicy,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T> Default for OperationOptions<T> {
    fn default() -> Self {
        Self {
            label: "operation".to_string(),
            immediate: false,
            retry: RetryPolicy::default(),
            on_success: None,
            on_error: None,
        }
    }
}

impl<T> OperationOptions<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Called once per successful terminal transition
    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Called once per terminal failure, never for failures that are retried
    pub fn on_error(mut self, callback: impl Fn(&EnhancedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Manual,
    Retry,
}

enum Completion<T> {
    Superseded,
    Succeeded(T),
    Retrying {
        attempt: u32,
        delay: Duration,
        error: EnhancedError,
    },
    Failed(EnhancedError),
}

struct Inner<T> {
    label: String,
    operation: Box<dyn Fn() -> OperationFuture<T> + Send + Sync>,
    retry: RetryPolicy,
    immediate: bool,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
    state: watch::Sender<OperationState<T>>,
    generation: AtomicU64,
    pending_retry: Mutex<Option<JoinHandle<()>>>,
    /// Spawned immediate run, aborted with the controller
    spawned_run: Mutex<Option<JoinHandle<()>>>,
    dependencies: Mutex<Option<u64>>,
}

impl<T> Inner<T> {
    /// Invalidate every run started so far and return the new generation
    fn supersede(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn cancel_pending_retry(&self) {
        if let Some(handle) = self.pending_retry.lock().take() {
            handle.abort();
            debug!("{}: cancelled pending retry", self.label);
        }
    }

    fn abort_spawned_run(&self) {
        if let Some(handle) = self.spawned_run.lock().take() {
            handle.abort();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    /// Enter `loading` and allocate the generation for a new run.
    ///
    /// Check-and-set happens under the channel lock so concurrent executes
    /// cannot both start. With `expected`, the run only starts while that
    /// generation is still current.
    fn begin(&self, force: bool, trigger: Trigger, expected: Option<u64>) -> Option<u64> {
        let mut started = None;
        self.state.send_if_modified(|state| {
            if expected.is_some_and(|generation| !self.is_current(generation)) {
                return false;
            }
            if state.loading && !force {
                return false;
            }
            started = Some(self.supersede());
            state.loading = true;
            state.error = None;
            if trigger == Trigger::Manual {
                state.retry_count = 0;
                state.is_retrying = false;
            }
            true
        });

        match started {
            Some(generation) => {
                if trigger == Trigger::Manual {
                    self.cancel_pending_retry();
                }
                debug!("{}: run {} started ({:?})", self.label, generation, trigger);
            }
            None => debug!("{}: execute skipped", self.label),
        }
        started
    }

    fn run(self: Arc<Self>, force: bool, trigger: Trigger) -> BoxFuture<'static, ()> {
        async move {
            if let Some(generation) = self.begin(force, trigger, None) {
                self.settle(generation).await;
            }
        }
        .boxed()
    }

    /// Invoke the operation for an already started run and apply its outcome
    fn settle(self: Arc<Self>, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            if !self.is_current(generation) {
                debug!("{}: run {} superseded before start", self.label, generation);
                return;
            }

            let outcome = (self.operation)().await;

            let mut completion = Completion::Superseded;
            self.state.send_if_modified(|state| {
                if !self.is_current(generation) {
                    return false;
                }
                state.loading = false;
                match outcome {
                    Ok(data) => {
                        state.data = Some(data.clone());
                        state.error = None;
                        state.retry_count = 0;
                        state.is_retrying = false;
                        completion = Completion::Succeeded(data);
                    }
                    Err(error) if self.retry.should_retry(&error, state.retry_count) => {
                        let attempt = state.retry_count;
                        state.retry_count += 1;
                        state.is_retrying = true;
                        completion = Completion::Retrying {
                            attempt,
                            delay: self.retry.delay_for(attempt),
                            error,
                        };
                    }
                    Err(error) => {
                        state.is_retrying = false;
                        state.error = Some(error.clone());
                        completion = Completion::Failed(error);
                    }
                }
                true
            });

            match completion {
                Completion::Superseded => {
                    debug!(
                        "{}: discarding result of superseded run {}",
                        self.label, generation
                    );
                }
                Completion::Succeeded(data) => {
                    debug!("{}: run {} succeeded", self.label, generation);
                    if let Some(callback) = &self.on_success {
                        callback(&data);
                    }
                }
                Completion::Retrying {
                    attempt,
                    delay,
                    error,
                } => {
                    warn!(
                        "{}: {} ({}), retry {}/{} in {:?}",
                        self.label,
                        error.error_code(),
                        error.message(),
                        attempt + 1,
                        self.retry.max_retries(),
                        delay
                    );
                    self.schedule_retry(generation, delay);
                }
                Completion::Failed(error) => {
                    error!(
                        "{}: failed with {}: {}",
                        self.label,
                        error.error_code(),
                        error.message()
                    );
                    if let Some(callback) = &self.on_error {
                        callback(&error);
                    }
                }
            }
        }
        .boxed()
    }

    fn schedule_retry(self: &Arc<Self>, generation: u64, delay: Duration) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Running now, no longer pending
            inner.pending_retry.lock().take();
            if let Some(next) = inner.begin(true, Trigger::Retry, Some(generation)) {
                inner.settle(next).await;
            }
        });

        if let Some(previous) = self.pending_retry.lock().replace(handle) {
            previous.abort();
        }
    }
}

/// Controller for one asynchronous operation.
///
/// Owns its pending retry timer and any spawned immediate run: dropping the
/// controller cancels both and discards any result still in flight.
pub struct AsyncOperation<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone + Send + Sync + 'static> AsyncOperation<T> {
    /// Create a controller around `operation`.
    ///
    /// With [`OperationOptions::immediate`] the first execution is spawned on
    /// the current Tokio runtime right away.
    pub fn new<F, Fut>(operation: F, options: OperationOptions<T>) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, EnhancedError>> + Send + 'static,
    {
        let OperationOptions {
            label,
            immediate,
            retry,
            on_success,
            on_error,
        } = options;
        let (state, _) = watch::channel(OperationState::default());

        let controller = Self {
            inner: Arc::new(Inner {
                label,
                operation: Box::new(move || operation().boxed()),
                retry,
                immediate,
                on_success,
                on_error,
                state,
                generation: AtomicU64::new(0),
                pending_retry: Mutex::new(None),
                spawned_run: Mutex::new(None),
                dependencies: Mutex::new(None),
            }),
        };

        if immediate {
            controller.start_immediate();
        }
        controller
    }

    fn start_immediate(&self) {
        match Handle::try_current() {
            Ok(runtime) => {
                // Loading and the generation are taken here, so a reset or drop
                // before the task is first polled still supersedes it
                let Some(generation) = self.inner.begin(true, Trigger::Manual, None) else {
                    return;
                };
                let handle = runtime.spawn(Arc::clone(&self.inner).settle(generation));
                *self.inner.spawned_run.lock() = Some(handle);
            }
            Err(_) => warn!(
                "{}: immediate execution requested outside a Tokio runtime, waiting for execute()",
                self.inner.label
            ),
        }
    }

    /// Run the operation and wait for this attempt to complete.
    ///
    /// No-op while already loading unless `force` is set. A manual execute
    /// cancels any pending retry and starts a fresh retry budget. When the
    /// attempt fails with a retryable error the retry is scheduled in the
    /// background; use [`settled`](Self::settled) to wait for the outcome.
    pub async fn execute(&self, force: bool) {
        Arc::clone(&self.inner).run(force, Trigger::Manual).await
    }

    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.inner.state.subscribe()
    }

    /// Wait until the controller is neither loading nor retrying
    pub async fn settled(&self) -> OperationState<T> {
        let mut receiver = self.inner.state.subscribe();
        let settled = receiver
            .wait_for(OperationState::is_settled)
            .await
            .map(|state| (*state).clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Record the operation's dependency set.
    ///
    /// The first call records a baseline. Any later change resets the
    /// controller and, in immediate mode, executes again. Returns whether the
    /// dependencies changed.
    pub async fn update_dependencies<D: Hash + ?Sized>(&self, dependencies: &D) -> bool {
        let mut hasher = DefaultHasher::new();
        dependencies.hash(&mut hasher);
        let fingerprint = hasher.finish();

        let previous = self.inner.dependencies.lock().replace(fingerprint);
        match previous {
            Some(previous) if previous != fingerprint => {
                debug!("{}: dependencies changed", self.inner.label);
                self.reset();
                if self.inner.immediate {
                    self.execute(false).await;
                }
                true
            }
            _ => false,
        }
    }
}

impl<T> AsyncOperation<T> {
    /// Return to the idle snapshot, cancel pending retries and discard any
    /// result still in flight
    pub fn reset(&self) {
        self.inner.cancel_pending_retry();
        self.inner.abort_spawned_run();
        self.inner.state.send_modify(|state| {
            self.inner.supersede();
            *state = OperationState::default();
        });
        debug!("{}: reset", self.inner.label);
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.state.borrow().status()
    }
}

impl<T> fmt::Debug for AsyncOperation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperation")
            .field("label", &self.inner.label)
            .field("status", &self.status())
            .field("retry", &self.inner.retry)
            .finish()
    }
}

impl<T> Drop for AsyncOperation<T> {
    fn drop(&mut self) {
        self.inner.cancel_pending_retry();
        self.inner.abort_spawned_run();
        self.inner.supersede();
    }
}
