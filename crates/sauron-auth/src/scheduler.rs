//! Background token refresh scheduler.
//!
//! ## State Diagram
//!
//! ```text
//! ┌───────────┐   Start    ┌───────────┐
//! │  Stopped  │ ─────────► │  Running  │ ◄─┐ Start (timer replaced)
//! └───────────┘            └─────┬─────┘ ──┘
//!       ▲                        │
//!       └──── Stop / RefreshFailed
//! ```
//!
//! While running, a recurring check looks at the stored access token and
//! refreshes it through the [`RefreshCoordinator`] when it is inside the
//! expiry horizon. A failed refresh stops the schedule.

use crate::{inspector, RefreshCoordinator};
use parking_lot::Mutex;
use rust_fsm::*;
use sauron_storage::TokenStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default interval between checks.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub scheduler_machine(Stopped)

    Stopped => {
        Start => Running
    },
    Running => {
        Start => Running,
        Stop => Stopped,
        RefreshFailed => Stopped
    }
}

pub use scheduler_machine::Input as SchedulerMachineInput;
pub use scheduler_machine::State as SchedulerMachineState;
pub use scheduler_machine::StateMachine as SchedulerMachine;

/// Scheduler state for display and serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Stopped,
    Running,
}

impl From<&SchedulerMachineState> for SchedulerState {
    fn from(state: &SchedulerMachineState) -> Self {
        match state {
            SchedulerMachineState::Stopped => SchedulerState::Stopped,
            SchedulerMachineState::Running => SchedulerState::Running,
        }
    }
}

/// Result of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// One of the tokens is missing; nothing to do.
    Skipped,
    /// Access token is outside the expiry horizon.
    Fresh,
    Refreshed,
    Failed,
}

/// Timing for the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Time between checks.
    pub check_interval: Duration,
    /// Refresh when the access token expires within this window.
    pub expiry_horizon: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            expiry_horizon: inspector::DEFAULT_EXPIRY_HORIZON,
        }
    }
}

/// Owns the recurring refresh task and its state machine.
///
/// `start()` spawns onto the current tokio runtime.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    config: SchedulerConfig,
    // Lock order: task, then fsm.
    task: Mutex<Option<JoinHandle<()>>>,
    fsm: Mutex<SchedulerMachine>,
    generation: AtomicU64,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                coordinator,
                config,
                task: Mutex::new(None),
                fsm: Mutex::new(SchedulerMachine::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> SchedulerState {
        SchedulerState::from(self.inner.fsm.lock().state())
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    /// Begin periodic checks. A running timer is cancelled and replaced.
    pub fn start(&self) {
        let mut task = self.inner.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
            debug!("Replaced running refresh timer");
        }

        if let Err(e) = self.inner.fsm.lock().consume(&SchedulerMachineInput::Start) {
            warn!(error = ?e, "Unexpected scheduler transition on start");
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = self.inner.clone();
        *task = Some(tokio::spawn(inner.run(generation)));

        info!(
            interval_secs = self.inner.config.check_interval.as_secs(),
            "Token refresh scheduler started"
        );
    }

    /// Cancel the timer. Safe to call when already stopped.
    pub fn stop(&self) {
        let mut task = self.inner.task.lock();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = task.take() {
            handle.abort();
        }

        let mut fsm = self.inner.fsm.lock();
        if *fsm.state() == SchedulerMachineState::Running {
            if let Err(e) = fsm.consume(&SchedulerMachineInput::Stop) {
                warn!(error = ?e, "Unexpected scheduler transition on stop");
            }
            info!("Token refresh scheduler stopped");
        }
    }

    /// Run one check now, independent of the timer.
    pub async fn tick(&self) -> TickOutcome {
        self.inner.tick().await
    }
}

impl SchedulerInner {
    async fn run(self: Arc<Self>, generation: u64) {
        let period = self.config.check_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.tick().await == TickOutcome::Failed {
                self.halt(generation);
                break;
            }
        }
    }

    async fn tick(&self) -> TickOutcome {
        let (Some(access_token), Some(_)) =
            (self.store.get_access_token(), self.store.get_refresh_token())
        else {
            debug!("Refresh check skipped, session incomplete");
            return TickOutcome::Skipped;
        };

        if !inspector::is_expiring_soon(&access_token, self.config.expiry_horizon) {
            return TickOutcome::Fresh;
        }

        info!("Access token expiring soon, refreshing");
        match self.coordinator.refresh().await {
            Ok(_) => TickOutcome::Refreshed,
            Err(e) => {
                warn!(error = %e, "Scheduled token refresh failed");
                TickOutcome::Failed
            }
        }
    }

    /// Stop after a failed refresh, unless the schedule was restarted or
    /// stopped in the meantime.
    fn halt(&self, generation: u64) {
        let mut task = self.task.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        // Dropping our own handle detaches; the loop exits right after.
        drop(task.take());

        if let Err(e) = self.fsm.lock().consume(&SchedulerMachineInput::RefreshFailed) {
            warn!(error = ?e, "Unexpected scheduler transition on failure");
        }
        info!("Token refresh scheduler stopped after failed refresh");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{endpoints, json_response, token_expiring_in, MockTransport};
    use crate::SessionExpiry;
    use sauron_storage::{MemoryStorage, SessionStorage, StorageKeys, UserProfile};
    use serde_json::json;

    fn scheduler(transport: Arc<MockTransport>) -> (RefreshScheduler, Arc<TokenStore>) {
        let store = Arc::new(TokenStore::in_memory());
        (scheduler_with_store(transport, store.clone()), store)
    }

    fn scheduler_with_store(transport: Arc<MockTransport>, store: Arc<TokenStore>) -> RefreshScheduler {
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            transport,
            endpoints(),
            SessionExpiry::new(),
        ));
        RefreshScheduler::new(store, coordinator, SchedulerConfig::default())
    }

    fn refresh_ok() -> Arc<MockTransport> {
        MockTransport::new(|_request| {
            Ok(json_response(
                200,
                json!({ "accessToken": token_expiring_in(3600), "refreshToken": "r2" }),
            ))
        })
    }

    fn refresh_rejected() -> Arc<MockTransport> {
        MockTransport::new(|_request| {
            Ok(json_response(401, json!({ "message": "Refresh token revoked" })))
        })
    }

    #[test]
    fn test_machine_transitions() {
        let mut machine = SchedulerMachine::new();
        assert_eq!(*machine.state(), SchedulerMachineState::Stopped);

        machine.consume(&SchedulerMachineInput::Start).unwrap();
        assert_eq!(*machine.state(), SchedulerMachineState::Running);
        machine.consume(&SchedulerMachineInput::Start).unwrap();
        assert_eq!(*machine.state(), SchedulerMachineState::Running);

        machine.consume(&SchedulerMachineInput::RefreshFailed).unwrap();
        assert_eq!(*machine.state(), SchedulerMachineState::Stopped);

        assert!(machine.consume(&SchedulerMachineInput::Stop).is_err());
    }

    #[tokio::test]
    async fn test_tick_skips_without_both_tokens() {
        let transport = refresh_ok();
        let (scheduler, _store) = scheduler(transport.clone());

        assert_eq!(scheduler.tick().await, TickOutcome::Skipped);

        // Resumed session: refresh token only.
        let durable = Arc::new(MemoryStorage::new());
        durable.set(StorageKeys::REFRESH_TOKEN, "r1").unwrap();
        let resumed = Arc::new(TokenStore::new(Arc::new(MemoryStorage::new()), durable));
        let resumed_scheduler = scheduler_with_store(transport.clone(), resumed);
        assert_eq!(resumed_scheduler.tick().await, TickOutcome::Skipped);

        // Access token only.
        let session = Arc::new(MemoryStorage::new());
        session.set(StorageKeys::ACCESS_TOKEN, &token_expiring_in(-60)).unwrap();
        let orphaned = Arc::new(TokenStore::new(session, Arc::new(MemoryStorage::new())));
        let orphaned_scheduler = scheduler_with_store(transport.clone(), orphaned);
        assert_eq!(orphaned_scheduler.tick().await, TickOutcome::Skipped);

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tick_leaves_fresh_token_alone() {
        let transport = refresh_ok();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session(&token_expiring_in(1000), "r1", &UserProfile::named("Ada"));

        assert_eq!(scheduler.tick().await, TickOutcome::Fresh);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tick_refreshes_expiring_token() {
        let transport = refresh_ok();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session(&token_expiring_in(200), "r1", &UserProfile::named("Ada"));

        assert_eq!(scheduler.tick().await, TickOutcome::Refreshed);
        assert_eq!(store.get_refresh_token(), Some("r2".to_string()));
        assert_eq!(transport.count("/api/auth/refresh"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_refreshes_on_interval() {
        let transport = refresh_ok();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session("not-a-jwt", "r1", &UserProfile::named("Ada"));

        scheduler.start();
        assert!(scheduler.is_running());

        // Nothing before the first interval elapses.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(transport.count("/api/auth/refresh"), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(transport.count("/api/auth/refresh"), 1);
        assert_eq!(store.get_refresh_token(), Some("r2".to_string()));

        // New token is fresh: later ticks do nothing.
        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(transport.count("/api/auth/refresh"), 1);
        assert!(scheduler.is_running());

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_stops_scheduler() {
        let transport = refresh_rejected();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session(&token_expiring_in(-60), "r1", &UserProfile::named("Ada"));

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert_eq!(transport.count("/api/auth/refresh"), 1);
        assert!(!store.is_authenticated());

        // Tokens reappear, but the timer is gone.
        store.set_session(&token_expiring_in(-60), "r1", &UserProfile::named("Ada"));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(transport.count("/api/auth/refresh"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_timer() {
        let transport = refresh_ok();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session("not-a-jwt", "r1", &UserProfile::named("Ada"));

        scheduler.start();
        scheduler.start();
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(transport.count("/api/auth/refresh"), 1);
        assert!(scheduler.is_running());
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_cancels_timer() {
        let transport = refresh_ok();
        let (scheduler, store) = scheduler(transport.clone());
        store.set_session("not-a-jwt", "r1", &UserProfile::named("Ada"));

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        scheduler.start();
        scheduler.stop();
        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(transport.requests().is_empty());
    }
}
