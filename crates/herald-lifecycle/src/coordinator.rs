//! Shutdown state machine and task registry.

use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Default time background tasks get to stop before they are aborted.
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Process lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Running,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        }
    }
}

type TeardownFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type TeardownHook = Box<dyn FnOnce() -> TeardownFuture + Send>;

struct Shared {
    state: watch::Sender<LifecycleState>,
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    background: Mutex<Vec<(String, JoinHandle<()>)>>,
    teardown: Mutex<Vec<(String, TeardownHook)>>,
    grace: Duration,
    started_at: Instant,
}

/// Coordinates startup readiness and graceful shutdown.
///
/// Cheap to clone. Components observe shutdown through
/// [`is_shutting_down`](Self::is_shutting_down) or the shared
/// [`CancellationToken`]; every long wait should select on
/// `token.cancelled()`.
#[derive(Clone)]
pub struct LifecycleCoordinator {
    shared: Arc<Shared>,
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE)
    }
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("state", &self.state())
            .field("ready", &self.is_ready())
            .field("grace", &self.shared.grace)
            .finish()
    }
}

impl LifecycleCoordinator {
    /// Create a coordinator in the `Running` state.
    pub fn new(grace: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Running);
        let (ready, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state,
                ready,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                background: Mutex::new(Vec::new()),
                teardown: Mutex::new(Vec::new()),
                grace,
                started_at: Instant::now(),
            }),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.shared.state.borrow()
    }

    /// Token cancelled on the transition to `ShuttingDown`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    /// Time since the coordinator was created.
    pub fn uptime(&self) -> Duration {
        self.shared.started_at.elapsed()
    }

    // ------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------

    /// Signal that startup has completed.
    pub fn mark_ready(&self) {
        if !self.shared.ready.send_replace(true) {
            info!("startup complete, ready");
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.shared.ready.borrow()
    }

    /// Wait until [`mark_ready`](Self::mark_ready) is called.
    ///
    /// Returns `false` if shutdown begins first.
    pub async fn wait_ready(&self) -> bool {
        let mut rx = self.shared.ready.subscribe();
        tokio::select! {
            biased;
            _ = self.shared.cancel.cancelled() => false,
            r = rx.wait_for(|ready| *ready) => r.is_ok(),
        }
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Register a long-running task to be joined (or aborted) on shutdown.
    ///
    /// The task is expected to watch the cancellation token. Registering
    /// after shutdown has begun aborts the task.
    pub fn register_background_task(&self, name: impl Into<String>, handle: JoinHandle<()>) {
        let name = name.into();
        if self.is_shutting_down() {
            warn!(task = %name, "background task registered during shutdown, aborting");
            handle.abort();
            return;
        }
        debug!(task = %name, "background task registered");
        self.shared.background.lock().push((name, handle));
    }

    /// Spawn and register a background task.
    pub fn spawn_background<F>(&self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.register_background_task(name, handle);
    }

    /// Spawn a short-lived per-event task tracked for shutdown.
    ///
    /// Returns `None` without spawning once shutdown has begun.
    pub fn spawn_event<F>(&self, future: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutting_down() {
            return None;
        }
        Some(self.shared.tracker.spawn(future))
    }

    /// Number of per-event tasks still running.
    pub fn in_flight(&self) -> usize {
        self.shared.tracker.len()
    }

    /// Register a hook run after all tasks have stopped (connection pools,
    /// sockets). Hooks run in registration order.
    pub fn on_teardown<F, Fut>(&self, name: impl Into<String>, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let hook: TeardownHook = Box::new(move || Box::pin(hook()));
        self.shared.teardown.lock().push((name.into(), hook));
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Begin shutdown. Idempotent; must be called inside a tokio runtime.
    ///
    /// Cancels the shared token immediately, then drains in the background:
    /// join registered tasks within the grace period (aborting stragglers),
    /// wait for in-flight event tasks, run teardown hooks, enter `Stopped`.
    pub fn request_shutdown(&self) {
        let transitioned = self.shared.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::ShuttingDown;
                true
            } else {
                false
            }
        });
        if !transitioned {
            return;
        }

        info!(in_flight = self.in_flight(), "shutdown requested");
        self.shared.cancel.cancel();

        let shared = self.shared.clone();
        tokio::spawn(async move { drain(shared).await });
    }

    /// Wait until the coordinator reaches `Stopped`.
    pub async fn await_shutdown_complete(&self) {
        let mut rx = self.shared.state.subscribe();
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }
}

async fn drain(shared: Arc<Shared>) {
    let deadline = Instant::now() + shared.grace;

    shared.tracker.close();
    let background = std::mem::take(&mut *shared.background.lock());
    for (name, mut handle) in background {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => debug!(task = %name, "background task stopped"),
            Ok(Err(e)) if e.is_cancelled() => debug!(task = %name, "background task was aborted"),
            Ok(Err(e)) => warn!(task = %name, error = %e, "background task panicked"),
            Err(_) => {
                warn!(task = %name, "background task ignored shutdown, aborting");
                handle.abort();
            }
        }
    }

    if tokio::time::timeout_at(deadline, shared.tracker.wait())
        .await
        .is_err()
    {
        warn!(
            remaining = shared.tracker.len(),
            "event tasks still running after grace period"
        );
    }

    let hooks = std::mem::take(&mut *shared.teardown.lock());
    for (name, hook) in hooks {
        debug!(hook = %name, "running teardown");
        hook().await;
    }

    shared.state.send_replace(LifecycleState::Stopped);
    info!("shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ==========================================
    // State machine
    // ==========================================

    #[tokio::test(start_paused = true)]
    async fn starts_running_and_reaches_stopped() {
        let lifecycle = LifecycleCoordinator::default();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert!(!lifecycle.is_shutting_down());

        lifecycle.request_shutdown();
        assert!(lifecycle.is_shutting_down());
        assert_ne!(lifecycle.state(), LifecycleState::Running);

        lifecycle.await_shutdown_complete().await;
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn request_shutdown_is_idempotent() {
        let lifecycle = LifecycleCoordinator::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        lifecycle.on_teardown("count", move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.request_shutdown();
        lifecycle.request_shutdown();
        lifecycle.await_shutdown_complete().await;
        lifecycle.request_shutdown();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    // ==========================================
    // Background tasks
    // ==========================================

    #[tokio::test(start_paused = true)]
    async fn cooperative_task_is_joined() {
        let lifecycle = LifecycleCoordinator::default();
        let token = lifecycle.cancellation_token();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        lifecycle.spawn_background("sleeper", async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
            }
            flag.store(true, Ordering::SeqCst);
        });

        let started = Instant::now();
        lifecycle.request_shutdown();
        lifecycle.await_shutdown_complete().await;

        assert!(finished.load(Ordering::SeqCst));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn stubborn_task_is_aborted_after_grace() {
        let lifecycle = LifecycleCoordinator::new(Duration::from_secs(2));
        lifecycle.spawn_background("stubborn", async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = Instant::now();
        lifecycle.request_shutdown();
        lifecycle.await_shutdown_complete().await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_runs_after_tasks_stop() {
        let lifecycle = LifecycleCoordinator::default();
        let token = lifecycle.cancellation_token();
        let task_done = Arc::new(AtomicBool::new(false));
        let saw_task_done = Arc::new(AtomicBool::new(false));

        let flag = task_done.clone();
        lifecycle.spawn_background("worker", async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            flag.store(true, Ordering::SeqCst);
        });

        let (flag, seen) = (task_done.clone(), saw_task_done.clone());
        lifecycle.on_teardown("http", move || async move {
            seen.store(flag.load(Ordering::SeqCst), Ordering::SeqCst);
        });

        lifecycle.request_shutdown();
        lifecycle.await_shutdown_complete().await;
        assert!(saw_task_done.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn no_event_tasks_after_shutdown() {
        let lifecycle = LifecycleCoordinator::default();
        assert!(lifecycle.spawn_event(async {}).is_some());

        lifecycle.request_shutdown();
        assert!(lifecycle.spawn_event(async {}).is_none());
        lifecycle.await_shutdown_complete().await;
    }

    #[tokio::test(start_paused = true)]
    async fn register_after_shutdown_aborts() {
        let lifecycle = LifecycleCoordinator::default();
        lifecycle.request_shutdown();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            flag.store(true, Ordering::SeqCst);
        });
        lifecycle.register_background_task("late", handle);
        lifecycle.await_shutdown_complete().await;

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    // ==========================================
    // Readiness
    // ==========================================

    #[tokio::test(start_paused = true)]
    async fn wait_ready_resolves_on_mark_ready() {
        let lifecycle = LifecycleCoordinator::default();
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_ready().await })
        };
        tokio::task::yield_now().await;
        lifecycle.mark_ready();
        assert!(waiter.await.unwrap());
        assert!(lifecycle.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_ready_returns_false_on_shutdown() {
        let lifecycle = LifecycleCoordinator::default();
        let waiter = {
            let lifecycle = lifecycle.clone();
            tokio::spawn(async move { lifecycle.wait_ready().await })
        };
        tokio::task::yield_now().await;
        lifecycle.request_shutdown();
        assert!(!waiter.await.unwrap());
    }
}
