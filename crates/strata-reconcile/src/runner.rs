//! Periodic task runner.
//!
//! [`PeriodicTask`] runs an async tick on a fixed cadence until shut down.
//! Each running task is observed and stopped through a [`TaskHandle`].
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use strata_reconcile::runner::PeriodicTask;
//!
//! # async fn run() {
//! let handle = PeriodicTask::new("heartbeat", Duration::from_secs(60))
//!     .spawn(|| async { Ok(()) });
//!
//! handle.shutdown();
//! handle.wait_stopped(Duration::from_secs(5)).await.ok();
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use strata_core::{Result, StrataConfig};

use crate::scheduler::ReconciliationScheduler;

// ============================================================================
// TaskState
// ============================================================================

/// Where a periodic task is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Not spawned yet, or finished.
    Stopped,
    /// Waiting for the next tick.
    Idle,
    /// A tick is in progress.
    Running,
    /// Shutdown requested; the current tick is finishing.
    Stopping,
}

impl TaskState {
    /// Returns `true` once the task loop has exited.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

// ============================================================================
// TaskHandle
// ============================================================================

/// Handle for observing and stopping a periodic task.
///
/// Clones share the same task.
#[derive(Clone)]
pub struct TaskHandle {
    inner: Arc<TaskHandleInner>,
}

struct TaskHandleInner {
    name: String,
    state: watch::Sender<TaskState>,
    shutdown: watch::Sender<bool>,
    ticks: AtomicU64,
    failures: AtomicU64,
}

impl TaskHandle {
    fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(TaskState::Stopped);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(TaskHandleInner {
                name: name.into(),
                state,
                shutdown,
                ticks: AtomicU64::new(0),
                failures: AtomicU64::new(0),
            }),
        }
    }

    /// The task's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current state.
    pub fn state(&self) -> TaskState {
        self.inner.state.borrow().clone()
    }

    /// Completed ticks, successful or not.
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that returned an error.
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.inner.state.subscribe()
    }

    /// Asks the task to stop after its current tick.
    pub fn shutdown(&self) {
        if !self.state().is_stopped() {
            self.set_state(TaskState::Stopping);
        }
        self.inner.shutdown.send_replace(true);
    }

    /// Waits until the task loop has exited, or `timeout` passes.
    pub async fn wait_stopped(&self, timeout: Duration) -> std::result::Result<(), String> {
        let mut rx = self.subscribe();
        let wait = async {
            loop {
                if rx.borrow_and_update().is_stopped() {
                    return Ok(());
                }
                if rx.changed().await.is_err() {
                    return Err(format!("Task '{}' channel closed", self.inner.name));
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "Task '{}' still {} after {timeout:?}",
                self.inner.name,
                self.state()
            )),
        }
    }

    fn set_state(&self, state: TaskState) {
        tracing::debug!(task = %self.inner.name, %state, "Task state changed");
        self.inner.state.send_replace(state);
    }

    fn record_tick(&self, result: Result<()>) {
        self.inner.ticks.fetch_add(1, Ordering::Relaxed);
        if let Err(e) = result {
            self.inner.failures.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(task = %self.inner.name, error = %e, "Periodic task tick failed");
        }
    }

    fn shutdown_requested(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .field("failures", &self.failures())
            .finish()
    }
}

// ============================================================================
// PeriodicTask
// ============================================================================

/// A named tick function and its cadence.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    name: String,
    period: Duration,
}

impl PeriodicTask {
    /// A task that ticks every `period`. The first tick is immediate.
    pub fn new(name: impl Into<String>, period: Duration) -> Self {
        Self {
            name: name.into(),
            period: period.max(Duration::from_millis(1)),
        }
    }

    /// The tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the task on the current tokio runtime.
    ///
    /// A failed tick is logged and counted; the next tick runs on schedule.
    /// Ticks that overrun the period delay the following tick rather than
    /// bursting.
    pub fn spawn<F, Fut>(self, mut tick: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = TaskHandle::new(self.name);
        let task = handle.clone();
        let mut shutdown = handle.shutdown_requested();
        let period = self.period;
        handle.set_state(TaskState::Idle);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(task = %task.name(), period_secs = period.as_secs(), "Periodic task started");

            loop {
                let stop = *shutdown.borrow_and_update();
                if stop {
                    break;
                }
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.changed() => break,
                }
                task.set_state(TaskState::Running);
                let result = tick().await;
                task.record_tick(result);
                let stop = *shutdown.borrow();
                if stop {
                    break;
                }
                task.set_state(TaskState::Idle);
            }

            task.set_state(TaskState::Stopped);
            tracing::info!(task = %task.name(), ticks = task.ticks(), "Periodic task stopped");
        });

        handle
    }
}

// ============================================================================
// Reconciliation tasks
// ============================================================================

/// Spawns the three reconciliation passes on their configured cadences:
/// group polling, storage promotion, and quota ingestion.
pub fn spawn_reconciliation_tasks(
    scheduler: &ReconciliationScheduler,
    config: &StrataConfig,
) -> Vec<TaskHandle> {
    let reconcile = &config.reconcile;

    let poller = scheduler.clone();
    let poll = PeriodicTask::new(
        "poll-access-allocations",
        Duration::from_secs(reconcile.poll_interval_secs),
    )
    .spawn(move || {
        let scheduler = poller.clone();
        async move { scheduler.poll_pending_access_allocations().await.map(drop) }
    });

    let promoter = scheduler.clone();
    let promote = PeriodicTask::new(
        "promote-storage-allocations",
        Duration::from_secs(reconcile.promote_interval_secs),
    )
    .spawn(move || {
        let scheduler = promoter.clone();
        async move { scheduler.promote_pending_storage_allocations().await.map(drop) }
    });

    let ingester = scheduler.clone();
    let ingest = PeriodicTask::new(
        "ingest-quota-usage",
        Duration::from_secs(reconcile.quota_ingest_interval_secs),
    )
    .spawn(move || {
        let scheduler = ingester.clone();
        async move { scheduler.ingest_daily_quota_usage().await.map(drop) }
    });

    vec![poll, promote, ingest]
}

// ============================================================================
// Tests
// ============================================================================
