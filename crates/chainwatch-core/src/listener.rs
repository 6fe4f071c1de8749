//! The confirmed-block listener — timer-driven poll loop with single-flight cycles.
//!
//! # One poll cycle
//! 1. Snapshot the cursor (`in_flight_target = last_dispatched`).
//! 2. Race `get_height` across all endpoints (each call retried with timeout).
//! 3. Subtract the confirmation depth; stop if nothing new is confirmed.
//! 4. On the very first cycle adopt the confirmed height instead of replaying history.
//! 5. For each new height in ascending order: race `get_block_by_number`, then
//!    hand the block to the executor before touching the next height.
//! 6. Commit the cursor to the confirmed height, even past skipped blocks,
//!    unless `cancel()` rolled it back meanwhile.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::{BlockExecutor, ChainRpcClient};
use crate::config::{validate_timing, ListenerConfig};
use crate::error::WatchError;
use crate::policy::{execute_with_timeout, run_parallel_first_success, RetryConfig};
use crate::tracker::{CyclePlan, HeightTracker, ListenerState};

/// A shared chain client for blocks of type `B`.
pub type Endpoint<B> = Arc<dyn ChainRpcClient<Block = B>>;

/// Externally visible lifecycle state.
///
/// There is no `Starting` state: `start()` spawns the tick loop synchronously,
/// so a listener goes straight from `Stopped` to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListenerStatus {
    /// Timer not running.
    Stopped,
    /// Timer running, no cycle in progress.
    Idle,
    /// Timer running, a cycle is in progress.
    Polling,
    /// Timer stopped while a cycle is still finishing.
    Stopping,
    /// Disposed; every further operation fails.
    Disposed,
}

impl std::fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Stopping => write!(f, "stopping"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Summary of a cycle that dispatched a range of heights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    /// First height of the range (inclusive).
    pub from: u64,
    /// Last height of the range (inclusive); the cursor's new value.
    pub to: u64,
    /// Blocks the executor accepted.
    pub delivered: u64,
    /// Heights no endpoint could serve. Skipped, never retried by the listener.
    pub fetch_failures: Vec<u64>,
    /// Heights whose executor call returned an error.
    pub executor_failures: Vec<u64>,
}

/// Result of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another cycle was running; this trigger was dropped.
    Skipped,
    /// Every endpoint failed height discovery; state unchanged.
    HeadUnavailable,
    /// Confirmed height is not above the cursor.
    NoNewBlocks { confirmed: u64 },
    /// First successful cycle adopted this height without dispatching.
    Seeded { height: u64 },
    /// A range was dispatched and the cursor advanced.
    Dispatched(CycleReport),
    /// `cancel()` ran during the cycle, so its cursor update was discarded.
    Superseded { confirmed: u64 },
}

/// Point-in-time view of a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSnapshot {
    pub status: ListenerStatus,
    pub last_dispatched: Option<u64>,
    pub in_flight_target: Option<u64>,
    pub cycles_completed: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Clears the single-flight flag when the cycle ends, even on panic.
struct FlightGuard(Arc<AtomicBool>);

impl FlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Ticker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared<B> {
    endpoints: Vec<Endpoint<B>>,
    executor: Arc<dyn BlockExecutor<B>>,
    tracker: HeightTracker,
    retry: RetryConfig,
    state: Mutex<ListenerState>,
    polling: Arc<AtomicBool>,
    cycles_completed: AtomicU64,
    last_cycle_at: Mutex<Option<DateTime<Utc>>>,
}

/// Watches redundant endpoints and delivers each newly confirmed block, in
/// order, to a [`BlockExecutor`].
pub struct BlockListener<B: Send + 'static> {
    shared: Arc<Shared<B>>,
    poll_interval: Duration,
    ticker: Mutex<Option<Ticker>>,
    disposed: AtomicBool,
}

impl<B: Send + 'static> BlockListener<B> {
    /// Build a listener over already-constructed endpoint clients.
    ///
    /// `config.endpoints` is not consulted here; it is the URL list the
    /// clients were built from. Fails on an empty client list or invalid timing.
    pub fn new(
        config: &ListenerConfig,
        endpoints: Vec<Endpoint<B>>,
        executor: Arc<dyn BlockExecutor<B>>,
    ) -> Result<Self, WatchError> {
        if endpoints.is_empty() {
            return Err(WatchError::InvalidConfig("at least one endpoint is required".into()));
        }
        validate_timing(config.poll_interval_ms, &config.retry)?;

        Ok(Self {
            shared: Arc::new(Shared {
                endpoints,
                executor,
                tracker: HeightTracker::new(config.confirmation_depth),
                retry: config.retry.clone(),
                state: Mutex::new(ListenerState::default()),
                polling: Arc::new(AtomicBool::new(false)),
                cycles_completed: AtomicU64::new(0),
                last_cycle_at: Mutex::new(None),
            }),
            poll_interval: config.poll_interval(),
            ticker: Mutex::new(None),
            disposed: AtomicBool::new(false),
        })
    }

    /// Begin periodic polling. The first tick fires one interval from now.
    ///
    /// Idempotent while running. Must be called inside a Tokio runtime.
    pub fn start(&self) -> Result<(), WatchError> {
        self.ensure_live()?;
        let mut ticker = lock(&self.ticker);
        if ticker.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return Ok(());
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(tick_loop(
            Arc::clone(&self.shared),
            self.poll_interval,
            token.clone(),
        ));
        *ticker = Some(Ticker { token, handle });

        tracing::info!(
            endpoints = self.shared.endpoints.len(),
            confirmation_depth = self.shared.tracker.confirmation_depth(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "block listener started"
        );
        Ok(())
    }

    /// Stop the timer. A cycle already running is left to finish.
    pub fn stop(&self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.token.cancel();
            tracing::info!("block listener stopped");
        }
    }

    /// Roll the cursor back to where the most recent cycle started, so the
    /// next cycle redelivers everything that cycle dispatched.
    ///
    /// Never interrupts in-flight network calls; a cycle running right now
    /// will not overwrite the rollback.
    pub fn cancel(&self) -> Result<(), WatchError> {
        self.ensure_live()?;
        let mut state = lock(&self.shared.state);
        let target = state.in_flight_target;
        state.rollback(target);
        tracing::info!(rolled_back_to = ?target, "block listener cursor rolled back");
        Ok(())
    }

    /// Release the timer. Idempotent; later operations fail with `Disposed`.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.stop();
        tracing::info!("block listener disposed");
    }

    /// Run one cycle now, under the same single-flight guard as the timer.
    pub async fn poll_once(&self) -> Result<PollOutcome, WatchError> {
        self.ensure_live()?;
        match FlightGuard::try_acquire(&self.shared.polling) {
            Some(guard) => Ok(self.shared.run_cycle(guard).await),
            None => Ok(PollOutcome::Skipped),
        }
    }

    /// Race `get_height` across all endpoints once and return the raw head.
    pub async fn chain_head(&self) -> Result<u64, WatchError> {
        self.ensure_live()?;
        self.shared.discover_head().await
    }

    pub fn status(&self) -> ListenerStatus {
        if self.disposed.load(Ordering::Acquire) {
            return ListenerStatus::Disposed;
        }
        let ticking = lock(&self.ticker)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished());
        let polling = self.shared.polling.load(Ordering::Acquire);
        match (ticking, polling) {
            (true, true) => ListenerStatus::Polling,
            (true, false) => ListenerStatus::Idle,
            (false, true) => ListenerStatus::Stopping,
            (false, false) => ListenerStatus::Stopped,
        }
    }

    pub fn state(&self) -> ListenerState {
        *lock(&self.shared.state)
    }

    pub fn snapshot(&self) -> ListenerSnapshot {
        let state = self.state();
        ListenerSnapshot {
            status: self.status(),
            last_dispatched: state.last_dispatched,
            in_flight_target: state.in_flight_target,
            cycles_completed: self.shared.cycles_completed.load(Ordering::Relaxed),
            last_cycle_at: *lock(&self.shared.last_cycle_at),
        }
    }

    fn ensure_live(&self) -> Result<(), WatchError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(WatchError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<B: Send + 'static> Drop for BlockListener<B> {
    fn drop(&mut self) {
        if let Some(ticker) = lock(&self.ticker).take() {
            ticker.token.cancel();
        }
    }
}

async fn tick_loop<B: Send + 'static>(
    shared: Arc<Shared<B>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(guard) = FlightGuard::try_acquire(&shared.polling) else {
                    tracing::trace!("poll cycle still running, dropping tick");
                    continue;
                };
                let cycle = Arc::clone(&shared);
                tokio::spawn(async move {
                    cycle.run_cycle(guard).await;
                });
            }
        }
    }

    tracing::debug!("block listener tick loop exited");
}

impl<B: Send + 'static> Shared<B> {
    async fn run_cycle(&self, _guard: FlightGuard) -> PollOutcome {
        let outcome = self.cycle().await;
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_cycle_at) = Some(Utc::now());
        outcome
    }

    async fn cycle(&self) -> PollOutcome {
        let snapshot = lock(&self.state).begin_cycle();

        let head = match self.discover_head().await {
            Ok(head) => head,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch current block height");
                return PollOutcome::HeadUnavailable;
            }
        };

        let heights = match self.tracker.plan(head, snapshot.last_dispatched) {
            CyclePlan::NoAdvance { confirmed } => {
                tracing::trace!(head, confirmed, "no new confirmed blocks");
                return PollOutcome::NoNewBlocks { confirmed };
            }
            CyclePlan::Seed { confirmed } => {
                if !lock(&self.state).commit(&snapshot, confirmed) {
                    return PollOutcome::Superseded { confirmed };
                }
                tracing::info!(head, height = confirmed, "cold start: cursor seeded at confirmed height");
                return PollOutcome::Seeded { height: confirmed };
            }
            CyclePlan::Dispatch { heights } => heights,
        };

        let mut report = CycleReport {
            from: *heights.start(),
            to: *heights.end(),
            delivered: 0,
            fetch_failures: vec![],
            executor_failures: vec![],
        };

        for height in heights {
            let block = match self.fetch_block(height).await {
                Ok(block) => block,
                Err(e) => {
                    tracing::warn!(height, error = %e, "block fetch failed on every endpoint, skipping");
                    report.fetch_failures.push(height);
                    continue;
                }
            };

            match self.executor.execute(height, block).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(height, error = %e, "executor failed for block");
                    report.executor_failures.push(height);
                }
            }
        }

        if !lock(&self.state).commit(&snapshot, report.to) {
            tracing::info!(
                confirmed = report.to,
                delivered = report.delivered,
                "cursor rolled back during cycle, discarding advance"
            );
            return PollOutcome::Superseded { confirmed: report.to };
        }

        tracing::info!(
            from = report.from,
            to = report.to,
            delivered = report.delivered,
            fetch_failures = report.fetch_failures.len(),
            executor_failures = report.executor_failures.len(),
            "poll cycle complete"
        );
        PollOutcome::Dispatched(report)
    }

    async fn discover_head(&self) -> Result<u64, WatchError> {
        self.race("get_height", |client| {
            async move { client.get_height().await }.boxed()
        })
        .await
    }

    async fn fetch_block(&self, height: u64) -> Result<B, WatchError> {
        self.race("get_block_by_number", move |client| {
            async move { client.get_block_by_number(height).await }.boxed()
        })
        .await
    }

    /// Race `call` across every endpoint, each wrapped in the retry policy.
    async fn race<T, F>(&self, method: &'static str, call: F) -> Result<T, WatchError>
    where
        T: Send + 'static,
        F: Fn(Endpoint<B>) -> BoxFuture<'static, Result<T, WatchError>> + Clone + Send + Sync + 'static,
    {
        let jobs = self.endpoints.iter().map(|client| {
            let client = Arc::clone(client);
            let call = call.clone();
            let retry = self.retry.clone();
            async move {
                let strategy = retry.delay_strategy();
                let result = execute_with_timeout(
                    &strategy,
                    || call(Arc::clone(&client)),
                    retry.max_attempts,
                    retry.attempt_timeout(),
                )
                .await;
                if let Err(e) = &result {
                    tracing::debug!(endpoint = client.url(), method, error = %e, "endpoint gave up");
                }
                result
            }
        });
        run_parallel_first_success(jobs).await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
