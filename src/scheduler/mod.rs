//! Periodic job scheduling.
//!
//! Two independent triggers drive this daemon (the status check and the
//! meme generation run). Each is a [`PeriodicJob`]: a restartable interval
//! timer owning at most one live tokio task, plus a [`RunGuard`] that
//! coalesces a tick arriving while the previous run — or a manual trigger
//! for the same job — is still in flight.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

// ─── RunGuard ─────────────────────────────────────────────────────────────────

/// Single-flight guard shared by a job's timer ticks and manual triggers.
///
/// `try_begin` either hands back an RAII token or reports that a run is
/// already in flight. The token releases on drop, so a run cancelled at an
/// await point can never wedge the guard shut.
#[derive(Debug, Clone, Default)]
pub struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    pub fn try_begin(&self) -> Option<RunToken> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| RunToken(Arc::clone(&self.0)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct RunToken(Arc<AtomicBool>);

impl Drop for RunToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ─── PeriodicJob ──────────────────────────────────────────────────────────────

/// A restartable interval trigger.
///
/// Invariant: at most one timer task is ever live. `restart` aborts the
/// previous task before spawning, `stop` is an idempotent cancel.
pub struct PeriodicJob {
    name: &'static str,
    handle: Mutex<Option<JoinHandle<()>>>,
    guard: RunGuard,
}

impl PeriodicJob {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handle: Mutex::new(None),
            guard: RunGuard::default(),
        }
    }

    /// The job's single-flight guard, for manual triggers of the same work.
    pub fn guard(&self) -> RunGuard {
        self.guard.clone()
    }

    /// Replace any live timer with one firing every `interval`.
    ///
    /// The first tick fires one full interval after the restart — a config
    /// change must not cause an immediate burst of work.
    pub async fn restart<F, Fut>(&self, interval: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut slot = self.handle.lock().await;
        if let Some(old) = slot.take() {
            old.abort();
        }

        let name = self.name;
        let guard = self.guard.clone();
        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            timer.tick().await; // consume the immediate first tick
            loop {
                timer.tick().await;
                match guard.try_begin() {
                    Some(_token) => tick().await,
                    None => {
                        debug!(job = name, "previous run still in flight — tick coalesced");
                    }
                }
            }
        });
        *slot = Some(task);
        info!(
            job = self.name,
            interval_ms = interval.as_millis() as u64,
            "periodic job started"
        );
    }

    /// Cancel the timer if one is live. Calling on an already-stopped job is
    /// a no-op.
    pub async fn stop(&self) {
        let mut slot = self.handle.lock().await;
        if let Some(old) = slot.take() {
            old.abort();
            info!(job = self.name, "periodic job stopped");
        }
    }

    pub async fn is_active(&self) -> bool {
        self.handle
            .lock()
            .await
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
