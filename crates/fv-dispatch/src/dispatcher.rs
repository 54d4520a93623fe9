//! The rate-limited dispatcher and its worker loop.

use crate::bucket::TokenBucket;
use crate::category::{classify_with, RequestCategory};
use crate::clock::{Clock, SystemClock};
use crate::config::DispatcherConfig;
use crate::error::{DispatchError, DispatchResult, RequestError, RequestOutcome};
use crate::health::{HealthReport, QueueMetrics};
use crate::http::{HttpCall, RequestDescriptor};
use crate::queue::{QueuedRequest, RequestQueue};
use futures_util::FutureExt;
use fv_telemetry::Metrics;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Request identifier (UUID v4).
pub type RequestId = String;

pub type SuccessCallback = Box<dyn FnOnce(Value) + Send + 'static>;
pub type ErrorCallback = Box<dyn FnOnce(RequestError) + Send + 'static>;

/// Lifecycle: `Stopped -> Running -> ShuttingDown -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Stopped,
    Running,
    ShuttingDown,
}

/// Handle to an enqueued request.
#[derive(Debug)]
pub struct RequestHandle {
    pub id: RequestId,
    pub category: RequestCategory,
    /// Resolves once the worker has executed (or refused) the request.
    pub outcome: oneshot::Receiver<RequestOutcome>,
}

impl RequestHandle {
    /// Wait for the outcome. A request dropped without a result yields
    /// [`RequestError::Dropped`].
    pub async fn wait(self) -> RequestOutcome {
        self.outcome.await.unwrap_or(Err(RequestError::Dropped))
    }
}

/// State shared between the dispatcher handle and its worker task.
struct Shared {
    config: DispatcherConfig,
    http: Arc<dyn HttpCall>,
    clock: Arc<dyn Clock>,
    read_queue: RequestQueue,
    write_queue: RequestQueue,
    read_bucket: Mutex<TokenBucket>,
    write_bucket: Mutex<TokenBucket>,
    shutting_down: AtomicBool,
    state: Mutex<DispatcherState>,
}

impl Shared {
    fn queue(&self, category: RequestCategory) -> &RequestQueue {
        match category {
            RequestCategory::Read => &self.read_queue,
            RequestCategory::Write => &self.write_queue,
        }
    }

    fn bucket(&self, category: RequestCategory) -> &Mutex<TokenBucket> {
        match category {
            RequestCategory::Read => &self.read_bucket,
            RequestCategory::Write => &self.write_bucket,
        }
    }

    fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
        *self.state.lock() = DispatcherState::ShuttingDown;
    }

    /// One worker iteration: refill due buckets, then run at most one read
    /// and one write request.
    async fn tick(&self) {
        let now = self.clock.now_ms();
        for category in RequestCategory::ALL {
            if self.bucket(category).lock().refill_if_due(now) {
                debug!(category = %category, "Token bucket refilled");
            }
        }

        for category in RequestCategory::ALL {
            if let Some(request) = self.take_next(category) {
                self.execute(request).await;
            }
        }
    }

    /// Pop the next request if a token is available, consuming the token.
    fn take_next(&self, category: RequestCategory) -> Option<QueuedRequest> {
        let mut bucket = self.bucket(category).lock();
        if bucket.available() == 0 {
            return None;
        }
        let request = self.queue(category).pop()?;
        bucket.try_consume();
        Some(request)
    }

    async fn execute(&self, request: QueuedRequest) {
        let QueuedRequest {
            id,
            category,
            enqueued_at_ms,
            descriptor,
            responder,
        } = request;
        let queued_ms = self.clock.now_ms().saturating_sub(enqueued_at_ms);

        if self.is_shutting_down() {
            debug!(request_id = %id, "Shutting down, skipping request");
            Metrics::dispatch_request(category.as_str(), "shutdown", queued_ms);
            let _ = responder.send(Err(RequestError::ShuttingDown));
            return;
        }

        match self.http.call(&descriptor).await {
            Ok(value) => {
                Metrics::dispatch_request(category.as_str(), "ok", queued_ms);
                if responder.send(Ok(value)).is_err() {
                    debug!(request_id = %id, "Requester gone before completion");
                }
            }
            Err(e) if e.is_shutdown_related() && self.is_shutting_down() => {
                debug!(
                    request_id = %id,
                    error = %e,
                    "Dropping shutdown-related failure"
                );
                Metrics::dispatch_request(category.as_str(), "dropped", queued_ms);
            }
            Err(e) => {
                warn!(
                    request_id = %id,
                    category = %category,
                    method = %descriptor.method,
                    path = %descriptor.path,
                    error = %e,
                    "Request failed"
                );
                Metrics::dispatch_request(category.as_str(), "error", queued_ms);
                if let Err(Err(unhandled)) = responder.send(Err(e.into())) {
                    warn!(request_id = %id, error = %unhandled, "Unhandled request error");
                }
            }
        }
    }

    /// Answer every queued request with `ShuttingDown`.
    fn drain_pending(&self) -> usize {
        let mut drained = 0;
        for category in RequestCategory::ALL {
            for request in self.queue(category).drain() {
                let _ = request.responder.send(Err(RequestError::ShuttingDown));
                drained += 1;
            }
        }
        drained
    }

    fn metrics(&self) -> QueueMetrics {
        let (read_tokens, max_read) = {
            let bucket = self.read_bucket.lock();
            (bucket.available(), bucket.capacity())
        };
        let (write_tokens, max_write) = {
            let bucket = self.write_bucket.lock();
            (bucket.available(), bucket.capacity())
        };
        QueueMetrics {
            read_queue_depth: self.read_queue.len(),
            write_queue_depth: self.write_queue.len(),
            read_queue_capacity: self.read_queue.capacity(),
            write_queue_capacity: self.write_queue.capacity(),
            read_tokens_available: read_tokens,
            write_tokens_available: write_tokens,
            max_read_tokens: max_read,
            max_write_tokens: max_write,
            timestamp: self.clock.now_ms(),
        }
    }
}

struct Worker {
    handle: JoinHandle<DispatchResult<()>>,
    cancel: CancellationToken,
}

/// Admission-controlled, rate-limited dispatcher for outbound requests.
///
/// `enqueue` never awaits: it checks capacity and pushes under a short
/// lock. A single worker task started by [`start`](Self::start) executes
/// queued requests within the per-second token budgets.
pub struct RateLimitedDispatcher {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    fault: Mutex<CancellationToken>,
}

impl std::fmt::Debug for RateLimitedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitedDispatcher")
            .field("state", &self.state())
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl RateLimitedDispatcher {
    pub fn new(config: DispatcherConfig, http: Arc<dyn HttpCall>) -> Self {
        Self::with_clock(config, http, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: DispatcherConfig,
        http: Arc<dyn HttpCall>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        let shared = Shared {
            read_queue: RequestQueue::new(config.queue_capacity(RequestCategory::Read)),
            write_queue: RequestQueue::new(config.queue_capacity(RequestCategory::Write)),
            read_bucket: Mutex::new(TokenBucket::new(
                config.rate_per_second(RequestCategory::Read),
                now,
            )),
            write_bucket: Mutex::new(TokenBucket::new(
                config.rate_per_second(RequestCategory::Write),
                now,
            )),
            shutting_down: AtomicBool::new(false),
            state: Mutex::new(DispatcherState::Stopped),
            config,
            http,
            clock,
        };
        Self {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
            fault: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    pub fn state(&self) -> DispatcherState {
        *self.shared.state.lock()
    }

    /// Cancelled when the worker aborts. The owner must then call
    /// [`shutdown`](Self::shutdown) and restart or exit.
    pub fn fault_signal(&self) -> CancellationToken {
        self.fault.lock().clone()
    }

    /// Classify using the configured path overrides.
    pub fn classify(&self, method: &str, path: &str) -> RequestCategory {
        classify_with(method, path, &self.shared.config.path_overrides)
    }

    /// Enqueue a request.
    ///
    /// Fails with [`DispatchError::QueueFull`] when the category's queue is
    /// at capacity and [`DispatchError::NotRunning`] while shutting down.
    /// Requests enqueued before `start` wait for the worker.
    pub fn enqueue(
        &self,
        category: RequestCategory,
        descriptor: RequestDescriptor,
    ) -> DispatchResult<RequestHandle> {
        if self.shared.is_shutting_down() {
            return Err(DispatchError::NotRunning);
        }

        let (responder, outcome) = oneshot::channel();
        let id = Uuid::new_v4().to_string();
        let request = QueuedRequest {
            id: id.clone(),
            category,
            enqueued_at_ms: self.shared.clock.now_ms(),
            descriptor,
            responder,
        };

        let queue = self.shared.queue(category);
        match queue.push(request) {
            Ok(depth) => {
                debug!(request_id = %id, category = %category, depth, "Request enqueued");
                Ok(RequestHandle {
                    id,
                    category,
                    outcome,
                })
            }
            Err(_) => {
                Metrics::dispatch_rejected(category.as_str());
                warn!(
                    category = %category,
                    capacity = queue.capacity(),
                    "Queue full, rejecting request"
                );
                Err(DispatchError::QueueFull {
                    category,
                    capacity: queue.capacity(),
                })
            }
        }
    }

    /// Classify the descriptor and enqueue it.
    pub fn submit(&self, descriptor: RequestDescriptor) -> DispatchResult<RequestHandle> {
        let category = self.classify(&descriptor.method, &descriptor.path);
        self.enqueue(category, descriptor)
    }

    /// Enqueue with completion callbacks instead of a handle.
    ///
    /// Spawns a task that waits for the outcome. An error with no
    /// `on_error` is logged as unhandled. Must be called within a Tokio
    /// runtime.
    pub fn enqueue_with_callbacks(
        &self,
        category: RequestCategory,
        descriptor: RequestDescriptor,
        on_success: SuccessCallback,
        on_error: Option<ErrorCallback>,
    ) -> DispatchResult<RequestId> {
        let handle = self.enqueue(category, descriptor)?;
        let id = handle.id.clone();

        tokio::spawn(async move {
            let RequestHandle { id, outcome, .. } = handle;
            match outcome.await {
                Ok(Ok(value)) => on_success(value),
                Ok(Err(e)) => match on_error {
                    Some(callback) => callback(e),
                    None => warn!(request_id = %id, error = %e, "Unhandled request error"),
                },
                Err(_) => debug!(request_id = %id, "Request dropped without a result"),
            }
        });

        Ok(id)
    }

    /// Spawn the worker. Calling again while a worker exists only warns.
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Dispatcher already started");
            return;
        }

        self.shared.shutting_down.store(false, Ordering::SeqCst);
        *self.shared.state.lock() = DispatcherState::Running;

        let cancel = CancellationToken::new();
        let fault = CancellationToken::new();
        *self.fault.lock() = fault.clone();

        let handle = tokio::spawn(run_worker(self.shared.clone(), cancel.clone(), fault));
        *worker = Some(Worker { handle, cancel });

        info!(
            read_per_second = self.shared.config.read_per_second,
            write_per_second = self.shared.config.write_per_second,
            "Dispatcher started"
        );
    }

    /// Stop the worker.
    ///
    /// Sets the shutdown flag, cancels the worker and waits up to the grace
    /// period. Requests still queued afterwards are answered with
    /// [`RequestError::ShuttingDown`]. Returns the worker's abort error if
    /// it failed, or [`DispatchError::ShutdownTimedOut`] if it had to be
    /// aborted. No-op when no worker is running.
    pub async fn shutdown(&self) -> DispatchResult<()> {
        let worker = self.worker.lock().take();
        let Some(Worker { mut handle, cancel }) = worker else {
            debug!("Shutdown requested with no worker running");
            return Ok(());
        };

        info!("Dispatcher shutting down");
        self.shared.begin_shutdown();
        cancel.cancel();

        let grace = self.shared.config.shutdown_grace();
        let result = match tokio::time::timeout(grace, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(DispatchError::WorkerAborted {
                reason: join_error.to_string(),
            }),
            Err(_) => {
                handle.abort();
                warn!(grace_ms = grace.as_millis() as u64, "Worker did not stop in time, aborted");
                Err(DispatchError::ShutdownTimedOut {
                    grace_ms: grace.as_millis() as u64,
                })
            }
        };

        let drained = self.shared.drain_pending();
        if drained > 0 {
            info!(drained, "Rejected queued requests on shutdown");
        }

        *self.shared.state.lock() = DispatcherState::Stopped;
        self.shared.shutting_down.store(false, Ordering::SeqCst);
        info!("Dispatcher stopped");
        result
    }

    pub fn queue_metrics(&self) -> QueueMetrics {
        let metrics = self.shared.metrics();
        Metrics::dispatch_queue(
            RequestCategory::Read.as_str(),
            metrics.read_queue_depth,
            metrics.read_tokens_available,
        );
        Metrics::dispatch_queue(
            RequestCategory::Write.as_str(),
            metrics.write_queue_depth,
            metrics.write_tokens_available,
        );
        metrics
    }

    pub fn health_status(&self) -> HealthReport {
        let report = HealthReport::from_metrics(self.queue_metrics());
        Metrics::dispatch_health(report.status.level());
        report
    }
}

impl Drop for RateLimitedDispatcher {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.cancel.cancel();
        }
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    fault: CancellationToken,
) -> DispatchResult<()> {
    let poll = shared.config.poll_interval();
    debug!(poll_ms = poll.as_millis() as u64, "Dispatcher worker running");

    while !cancel.is_cancelled() {
        if let Err(payload) = AssertUnwindSafe(shared.tick()).catch_unwind().await {
            let reason = panic_message(payload.as_ref());
            error!(reason = %reason, "Dispatcher worker aborted");
            shared.begin_shutdown();
            fault.cancel();
            return Err(DispatchError::WorkerAborted { reason });
        }

        tokio::select! {
            () = tokio::time::sleep(poll) => {}
            () = cancel.cancelled() => break,
        }
    }

    debug!("Dispatcher worker exited");
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
