//! Idle session monitoring.
//!
//! An [`IdleMonitor`] owns the single pending expiry for one principal. Every
//! activity report cancels that expiry and schedules a fresh one; when a
//! deadline passes untouched the principal is signed out and sent to login.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
    time::Duration,
};
use tokio::{task::JoinHandle, time::Instant};
use uuid::Uuid;

use crate::{identity::IdentityState, navigation::NavigatorState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Deadline armed.
    Active,
    /// The deadline passed and the session was terminated. Terminal.
    Expired,
    /// Cancelled by logout or by a newer page load. Terminal.
    Stopped,
}

struct Timer {
    state: MonitorState,
    // Bumped on every schedule; an expiry only acts if it carries the latest.
    generation: u64,
    pending: Option<JoinHandle<()>>,
    deadline: Option<Instant>,
}

type Registry = RwLock<HashMap<Uuid, Arc<IdleMonitor>>>;

pub struct IdleMonitor {
    principal_id: Uuid,
    timeout: Duration,
    identity: IdentityState,
    navigator: NavigatorState,
    login_url: String,
    timer: Mutex<Timer>,
    // The owning registry, if any. An expired monitor removes itself.
    registry: Weak<Registry>,
}

impl IdleMonitor {
    /// Creates a monitor in the Active state with its first deadline armed.
    /// Must be called from within a tokio runtime.
    pub fn start(
        principal_id: Uuid,
        timeout: Duration,
        identity: IdentityState,
        navigator: NavigatorState,
        login_url: impl Into<String>,
    ) -> Arc<Self> {
        Self::launch(principal_id, timeout, identity, navigator, login_url.into(), Weak::new())
    }

    fn launch(
        principal_id: Uuid,
        timeout: Duration,
        identity: IdentityState,
        navigator: NavigatorState,
        login_url: String,
        registry: Weak<Registry>,
    ) -> Arc<Self> {
        let monitor = Arc::new(Self {
            principal_id,
            timeout,
            identity,
            navigator,
            login_url,
            timer: Mutex::new(Timer {
                state: MonitorState::Active,
                generation: 0,
                pending: None,
                deadline: None,
            }),
            registry,
        });
        {
            let mut timer = monitor.timer.lock();
            monitor.schedule(&mut timer);
        }
        tracing::debug!(principal = %principal_id, timeout_secs = timeout.as_secs(), "idle monitor started");
        monitor
    }

    /// Replaces the pending expiry with a fresh one. Returns the new deadline,
    /// or `None` once the monitor has left the Active state.
    pub fn rearm(self: &Arc<Self>) -> Option<Instant> {
        let mut timer = self.timer.lock();
        if timer.state != MonitorState::Active {
            return None;
        }
        Some(self.schedule(&mut timer))
    }

    /// Cancels the pending expiry without signing out.
    pub fn stop(&self) {
        let mut timer = self.timer.lock();
        if timer.state == MonitorState::Active {
            timer.state = MonitorState::Stopped;
            if let Some(pending) = timer.pending.take() {
                pending.abort();
            }
            timer.deadline = None;
            tracing::debug!(principal = %self.principal_id, "idle monitor stopped");
        }
    }

    pub fn state(&self) -> MonitorState {
        self.timer.lock().state
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.lock().deadline
    }

    pub fn principal_id(&self) -> Uuid {
        self.principal_id
    }

    // Caller holds the timer lock.
    fn schedule(self: &Arc<Self>, timer: &mut Timer) -> Instant {
        if let Some(previous) = timer.pending.take() {
            previous.abort();
        }
        timer.generation += 1;
        let generation = timer.generation;
        let deadline = Instant::now() + self.timeout;

        let monitor = Arc::downgrade(self);
        timer.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(monitor) = monitor.upgrade() {
                monitor.expire(generation).await;
            }
        }));
        timer.deadline = Some(deadline);
        deadline
    }

    async fn expire(&self, generation: u64) {
        {
            let mut timer = self.timer.lock();
            if timer.state != MonitorState::Active || timer.generation != generation {
                return;
            }
            timer.state = MonitorState::Expired;
            // This task is the pending one; dropping the handle detaches it.
            timer.pending = None;
            timer.deadline = None;
        }

        if let Some(registry) = self.registry.upgrade() {
            let mut monitors = registry.write();
            let current = monitors
                .get(&self.principal_id)
                .is_some_and(|m| std::ptr::eq(Arc::as_ptr(m), self));
            if current {
                monitors.remove(&self.principal_id);
            }
        }

        tracing::info!(principal = %self.principal_id, "idle timeout reached, terminating session");

        // Queued before signing out so sign-out observers see it pending.
        // A failed sign-out must not keep the user on the page.
        self.navigator.redirect(self.principal_id, &self.login_url);
        if let Err(e) = self.identity.sign_out(self.principal_id).await {
            tracing::warn!(principal = %self.principal_id, "sign-out after idle timeout failed: {}", e);
        }
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        if let Some(pending) = self.timer.get_mut().pending.take() {
            pending.abort();
        }
    }
}

/// Result of reporting user activity for a principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityOutcome {
    Rearmed { expires_at: DateTime<Utc> },
    /// The cycle ended while the report was being handled.
    Expired,
    /// No cycle on record; expired cycles are forgotten.
    NotMonitored,
}

/// IdleMonitors
///
/// One monitor per principal. A page load replaces the principal's cycle.
pub struct IdleMonitors {
    timeout: Duration,
    login_url: String,
    identity: IdentityState,
    navigator: NavigatorState,
    monitors: Arc<Registry>,
}

impl IdleMonitors {
    pub fn new(
        timeout: Duration,
        login_url: impl Into<String>,
        identity: IdentityState,
        navigator: NavigatorState,
    ) -> Self {
        Self {
            timeout,
            login_url: login_url.into(),
            identity,
            navigator,
            monitors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Where an expired session is sent.
    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    /// Starts a fresh Active cycle for the principal, stopping any earlier one.
    pub fn begin_page(&self, principal_id: Uuid) -> Arc<IdleMonitor> {
        let monitor = IdleMonitor::launch(
            principal_id,
            self.timeout,
            self.identity.clone(),
            self.navigator.clone(),
            self.login_url.clone(),
            Arc::downgrade(&self.monitors),
        );
        let previous = self.monitors.write().insert(principal_id, monitor.clone());
        if let Some(previous) = previous {
            previous.stop();
        }
        monitor
    }

    pub fn record_activity(&self, principal_id: Uuid) -> ActivityOutcome {
        let monitor = self.monitors.read().get(&principal_id).cloned();
        let Some(monitor) = monitor else {
            return ActivityOutcome::NotMonitored;
        };

        match monitor.rearm() {
            Some(_) => {
                let window = chrono::Duration::from_std(self.timeout)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                ActivityOutcome::Rearmed {
                    expires_at: Utc::now() + window,
                }
            }
            None => ActivityOutcome::Expired,
        }
    }

    /// Stops and forgets the principal's monitor. Returns whether one existed.
    pub fn stop(&self, principal_id: Uuid) -> bool {
        let removed = self.monitors.write().remove(&principal_id);
        match removed {
            Some(monitor) => {
                monitor.stop();
                true
            }
            None => false,
        }
    }

    pub fn state(&self, principal_id: Uuid) -> Option<MonitorState> {
        self.monitors.read().get(&principal_id).map(|m| m.state())
    }
}
