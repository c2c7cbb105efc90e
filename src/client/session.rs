use crate::client::backoff::{Backoff, BackoffPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Outcome of one `ensure_session` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// The consuming view is hidden; nothing was checked.
    Skipped,
    /// A session was already held.
    Active,
    /// Another call is logging in right now.
    Pending,
    /// This call logged in.
    Acquired,
    /// Login failed; a retry is scheduled.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    NoSession,
    Acquiring,
    Active(String),
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    backoff: Backoff,
}

/// What a caller of [`SessionManager::begin`] should do next.
pub enum Begin {
    AlreadyActive,
    InFlight,
    Start(AcquireGuard),
}

/// Acquisition state plus retry schedule behind one lock.
///
/// Nothing here performs I/O; the client drives login through [`Begin`] and
/// [`AcquireGuard`]. The lock is never held across an await.
#[derive(Debug)]
pub struct SessionManager {
    inner: Mutex<Inner>,
    view_active: AtomicBool,
    wake: Notify,
}

impl SessionManager {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: SessionState::NoSession,
                backoff: Backoff::new(policy),
            }),
            view_active: AtomicBool::new(true),
            wake: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_view_active(&self) -> bool {
        self.view_active.load(Ordering::SeqCst)
    }

    /// Showing the view again drops any retry deadline armed before it was
    /// hidden; the activation check takes its place.
    pub fn set_view_active(&self, active: bool) {
        let was_active = self.view_active.swap(active, Ordering::SeqCst);
        if active && !was_active {
            self.lock().backoff.cancel_pending();
        }
        self.wake.notify_one();
    }

    pub fn session_id(&self) -> Option<String> {
        match &self.lock().state {
            SessionState::Active(id) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn is_acquiring(&self) -> bool {
        self.lock().state == SessionState::Acquiring
    }

    pub fn begin(self: &Arc<Self>) -> Begin {
        let mut inner = self.lock();
        match inner.state {
            SessionState::Active(_) => {
                inner.backoff.reset();
                Begin::AlreadyActive
            }
            SessionState::Acquiring => Begin::InFlight,
            SessionState::NoSession => {
                inner.state = SessionState::Acquiring;
                Begin::Start(AcquireGuard {
                    manager: Arc::clone(self),
                    finished: false,
                })
            }
        }
    }

    /// Drops a session the backend no longer accepts.
    pub fn invalidate(&self) {
        let mut inner = self.lock();
        if matches!(inner.state, SessionState::Active(_)) {
            inner.state = SessionState::NoSession;
            tracing::warn!("session invalidated by backend");
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.lock().backoff.delay()
    }

    pub fn retry_deadline(&self) -> Option<Instant> {
        self.lock().backoff.pending()
    }

    /// Called by the supervisor when the retry deadline passes.
    pub fn fire_retry(&self) {
        self.lock().backoff.fire();
    }

    pub(crate) async fn woken(&self) {
        self.wake.notified().await;
    }
}

/// Held while a login is in flight. Dropping it without finishing puts the
/// state back to `NoSession` so a cancelled attempt cannot wedge the manager.
pub struct AcquireGuard {
    manager: Arc<SessionManager>,
    finished: bool,
}

impl AcquireGuard {
    pub fn succeed(mut self, session_id: String) {
        let mut inner = self.manager.lock();
        inner.state = SessionState::Active(session_id);
        inner.backoff.reset();
        self.finished = true;
    }

    /// Returns the delay of the newly armed retry, or `None` if one was
    /// already pending.
    pub fn fail(mut self) -> Option<Duration> {
        let scheduled = {
            let mut inner = self.manager.lock();
            inner.state = SessionState::NoSession;
            inner.backoff.schedule(Instant::now())
        };
        self.finished = true;
        self.manager.wake.notify_one();
        scheduled
    }
}

impl Drop for AcquireGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut inner = self.manager.lock();
            if inner.state == SessionState::Acquiring {
                inner.state = SessionState::NoSession;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<SessionManager> {
        Arc::new(SessionManager::new(BackoffPolicy::default()))
    }

    #[test]
    fn second_begin_while_acquiring_is_in_flight() {
        let manager = manager();
        let Begin::Start(guard) = manager.begin() else {
            panic!("first begin should start");
        };
        assert!(matches!(manager.begin(), Begin::InFlight));

        guard.succeed("sess-1".to_string());
        assert!(matches!(manager.begin(), Begin::AlreadyActive));
        assert_eq!(manager.session_id().as_deref(), Some("sess-1"));
    }

    #[test]
    fn dropped_guard_returns_to_no_session() {
        let manager = manager();
        match manager.begin() {
            Begin::Start(guard) => drop(guard),
            _ => panic!("expected start"),
        }
        assert!(!manager.is_acquiring());
        assert!(matches!(manager.begin(), Begin::Start(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_arms_single_retry() {
        let manager = manager();
        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        assert_eq!(guard.fail(), Some(Duration::from_secs(10)));

        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        assert_eq!(guard.fail(), None);
        assert!(manager.retry_deadline().is_some());
    }

    #[test]
    fn success_resets_backoff_and_cancels_retry() {
        let manager = manager();
        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        guard.fail();
        manager.fire_retry();
        assert_eq!(manager.current_delay(), Duration::from_secs(20));

        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        guard.succeed("sess".to_string());
        assert_eq!(manager.current_delay(), Duration::from_secs(5));
        assert_eq!(manager.retry_deadline(), None);
    }

    #[test]
    fn reshowing_view_drops_stale_retry_but_keeps_delay() {
        let manager = manager();
        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        guard.fail();
        manager.set_view_active(false);
        assert!(manager.retry_deadline().is_some());

        manager.set_view_active(true);
        assert_eq!(manager.retry_deadline(), None);
        assert_eq!(manager.current_delay(), Duration::from_secs(10));

        // Already visible: a pending retry stays armed.
        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        guard.fail();
        manager.set_view_active(true);
        assert!(manager.retry_deadline().is_some());
    }

    #[test]
    fn invalidate_only_clears_active_sessions() {
        let manager = manager();
        let Begin::Start(guard) = manager.begin() else {
            panic!("expected start");
        };
        manager.invalidate();
        assert!(manager.is_acquiring());

        guard.succeed("sess".to_string());
        manager.invalidate();
        assert_eq!(manager.session_id(), None);
    }
}
