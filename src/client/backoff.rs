use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay used for the first retry after start-up.
    pub initial: Duration,
    /// Delay the schedule returns to after a successful login.
    pub floor: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(10),
            floor: Duration::from_secs(5),
            max: Duration::from_secs(60),
        }
    }
}

/// Retry schedule for session acquisition. At most one retry is pending.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    delay: Duration,
    pending: Option<Instant>,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            delay: policy.initial.min(policy.max),
            policy,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn pending(&self) -> Option<Instant> {
        self.pending
    }

    /// Arms a retry `delay` from `now`. Ignored while one is already pending.
    pub fn schedule(&mut self, now: Instant) -> Option<Duration> {
        if self.pending.is_some() {
            return None;
        }
        self.pending = Some(now + self.delay);
        Some(self.delay)
    }

    /// Consumes the pending retry and doubles the delay for the next one.
    pub fn fire(&mut self) {
        self.pending = None;
        self.delay = self.delay.saturating_mul(2).min(self.policy.max);
    }

    /// Drops the pending retry without touching the delay.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.delay = self.policy.floor;
    }
}
