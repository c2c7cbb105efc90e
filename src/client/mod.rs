//! Client half: keeps a proxy session alive, caches the diary selection and
//! drives booking CRUD through a [`SchedulerBackend`].

pub mod backend;
pub mod backoff;
pub mod cache;
pub mod error;
pub mod gateway;
pub mod session;
pub mod validation;

#[cfg(test)]
mod fake;

pub use backend::{HttpBackend, SchedulerBackend};
pub use backoff::{Backoff, BackoffPolicy};
pub use cache::{ResourceCache, Selection, SelectionChange};
pub use error::{ClientError, MutationKind};
pub use gateway::{BookingListing, BookingsView, FormOptions, classify_mutation};
pub use session::{SessionManager, SessionStatus};
pub use validation::{BookingForm, ValidationError};

use crate::config::ClientConfig;
use crate::models::{Envelope, LoginResponse, Uid};
use chrono::NaiveDate;
use session::{AcquireGuard, Begin};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Entry point for callers. Cheap to clone; clones share one session and
/// one cache.
pub struct SchedulerClient<B> {
    inner: Arc<Shared<B>>,
}

struct Shared<B> {
    backend: Arc<B>,
    session: Arc<SessionManager>,
    cache: RwLock<ResourceCache>,
    config: ClientConfig,
}

impl<B> Clone for SchedulerClient<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SchedulerClient<HttpBackend> {
    /// Client talking to the proxy at `config.backend_url`.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let backend = HttpBackend::new(config.backend_url.clone())?;
        Ok(Self::new(backend, config))
    }
}

impl<B: SchedulerBackend> SchedulerClient<B> {
    pub fn new(backend: B, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Shared {
                backend: Arc::new(backend),
                session: Arc::new(SessionManager::new(config.backoff)),
                cache: RwLock::new(ResourceCache::default()),
                config,
            }),
        }
    }

    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.inner.backend)
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Logs in unless a session is held, a login is in flight, or the view is
    /// hidden. A fresh session refreshes the diary list.
    pub async fn ensure_session(&self) -> SessionStatus {
        let session = &self.inner.session;
        if !session.is_view_active() {
            tracing::debug!("view inactive, session check skipped");
            return SessionStatus::Skipped;
        }

        let guard = match session.begin() {
            Begin::AlreadyActive => return SessionStatus::Active,
            Begin::InFlight => return SessionStatus::Pending,
            Begin::Start(guard) => guard,
        };

        tracing::info!("logging in to booking service");
        match self.inner.backend.login().await {
            Ok(LoginResponse {
                success: true,
                session_uid: Some(session_id),
                ..
            }) => {
                guard.succeed(session_id);
                tracing::info!("session acquired");
                if let Err(err) = self.refresh_diaries().await {
                    tracing::warn!(error = %err, "diary refresh after login failed");
                }
                SessionStatus::Acquired
            }
            Ok(response) => {
                let reason = response.error.unwrap_or_else(|| "no session in reply".to_string());
                Self::login_failed(guard, &reason)
            }
            Err(err) => Self::login_failed(guard, &err.to_string()),
        }
    }

    fn login_failed(guard: AcquireGuard, reason: &str) -> SessionStatus {
        match guard.fail() {
            Some(delay) => tracing::warn!(%reason, retry_in = ?delay, "login failed"),
            None => tracing::warn!(%reason, "login failed, retry already scheduled"),
        }
        SessionStatus::Failed
    }

    /// Marks the view visible and checks the session straight away.
    pub async fn activate(&self) -> SessionStatus {
        self.inner.session.set_view_active(true);
        self.ensure_session().await
    }

    pub fn deactivate(&self) {
        self.inner.session.set_view_active(false);
    }

    /// Re-fetches diaries and reconciles the selection; a moved selection
    /// refreshes statuses and the day's bookings.
    pub async fn refresh_diaries(&self) -> Result<SelectionChange, ClientError> {
        self.require_session()?;
        let diaries = listed(self.track(self.inner.backend.diaries().await)?, "diaries")?;
        tracing::debug!(count = diaries.len(), "diaries fetched");

        let change = self.inner.cache.write().await.reconcile_diaries(diaries);
        self.cascade(change).await;
        Ok(change)
    }

    /// Explicit pick from the diary list.
    pub async fn select_diary(&self, uid: Uid) -> Result<SelectionChange, ClientError> {
        let change = self
            .inner
            .cache
            .write()
            .await
            .select_diary(uid)
            .ok_or(ClientError::UnknownDiary(uid))?;
        self.cascade(change).await;
        Ok(change)
    }

    /// Picks the day to show and lists it.
    pub async fn set_date(&self, date: NaiveDate) -> Result<BookingsView, ClientError> {
        self.inner.cache.write().await.set_selected_date(Some(date));
        self.list_bookings(Some(date)).await
    }

    pub async fn refresh_booking_statuses(&self) -> Result<(), ClientError> {
        let selection = self.selection().await.ok_or(ClientError::NoDiarySelected)?;
        self.require_session()?;
        let statuses = listed(
            self.track(
                self.inner
                    .backend
                    .booking_statuses(selection.diary_uid, selection.entity_uid)
                    .await,
            )?,
            "booking statuses",
        )?;
        tracing::debug!(count = statuses.len(), diary = %selection.diary_uid, "statuses fetched");
        self.inner.cache.write().await.replace_statuses(statuses);
        Ok(())
    }

    async fn cascade(&self, change: SelectionChange) {
        let SelectionChange::Changed(selection) = change else {
            return;
        };
        tracing::info!(diary = %selection.diary_uid, entity = %selection.entity_uid, "diary selection changed");

        if let Err(err) = self.refresh_booking_statuses().await {
            tracing::warn!(error = %err, "status refresh failed");
        }
        let date = self.selected_date().await;
        if date.is_none() {
            return;
        }
        if let Err(err) = self.list_bookings(date).await {
            tracing::warn!(error = %err, "bookings refresh failed");
        }
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.inner.cache.read().await.selection()
    }

    pub async fn selected_date(&self) -> Option<NaiveDate> {
        self.inner.cache.read().await.selected_date()
    }

    /// Snapshot of the cache for display.
    pub async fn cache(&self) -> ResourceCache {
        self.inner.cache.read().await.clone()
    }

    fn require_session(&self) -> Result<(), ClientError> {
        match self.inner.session.session_id() {
            Some(_) => Ok(()),
            None => Err(ClientError::NoSession),
        }
    }

    /// A 401 means the proxy lost its session; drop ours so the next check
    /// logs in again.
    fn track<T>(&self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthorized) = &result {
            self.inner.session.invalidate();
        }
        result
    }

    /// Starts the liveness loop: checks the session every `check_interval`
    /// and fires the pending retry when its deadline passes. Stops when the
    /// handle is dropped.
    pub fn spawn_supervisor(&self) -> SupervisorHandle {
        let client = self.clone();
        SupervisorHandle {
            task: tokio::spawn(async move { client.supervise().await }),
        }
    }

    async fn supervise(self) {
        let session = Arc::clone(&self.inner.session);
        let mut ticker = tokio::time::interval(self.inner.config.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let retry_at = session
                .is_view_active()
                .then(|| session.retry_deadline())
                .flatten();

            tokio::select! {
                _ = ticker.tick() => {
                    self.ensure_session().await;
                }
                _ = session.woken() => {}
                _ = sleep_until(retry_at) => {
                    session.fire_retry();
                    tracing::debug!(next_delay = ?session.current_delay(), "retrying login");
                    self.ensure_session().await;
                }
            }
        }
    }
}

/// Items of a listing reply. A reply without `data` is a failed fetch and
/// must leave the cache alone.
fn listed<T>(envelope: Envelope<Vec<T>>, what: &'static str) -> Result<Vec<T>, ClientError> {
    envelope.data.ok_or(ClientError::MissingData { what })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Owns the supervisor task.
pub struct SupervisorHandle {
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Aborts the task; same as dropping the handle.
    pub fn stop(self) {}
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
