// Upstream rate limiter
// AniList publishes a 90 requests/minute quota. We stay under it with a
// minimum spacing between call starts, a rolling per-window budget, and at
// most one call in flight.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Minimum time between two call starts
    pub min_spacing: Duration,
    /// Maximum number of call starts inside any rolling `window`
    pub max_per_window: usize,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            min_spacing: Duration::from_millis(700),
            max_per_window: 90,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Default)]
struct LimiterState {
    last_start: Option<Instant>,
    recent_starts: VecDeque<Instant>,
}

impl LimiterState {
    /// How long to wait before the next call may start, if at all
    fn wait_needed(&mut self, policy: &RateLimitPolicy, now: Instant) -> Option<Duration> {
        while let Some(&oldest) = self.recent_starts.front() {
            if now.duration_since(oldest) >= policy.window {
                self.recent_starts.pop_front();
            } else {
                break;
            }
        }

        let spacing_wait = self
            .last_start
            .map(|last| policy.min_spacing.saturating_sub(now.duration_since(last)))
            .unwrap_or_default();

        let budget_wait = if self.recent_starts.len() >= policy.max_per_window.max(1) {
            self.recent_starts
                .front()
                .map(|&oldest| policy.window.saturating_sub(now.duration_since(oldest)))
                .unwrap_or_default()
        } else {
            Duration::ZERO
        };

        let wait = spacing_wait.max(budget_wait);
        (!wait.is_zero()).then_some(wait)
    }

    fn record_start(&mut self, now: Instant) {
        self.last_start = Some(now);
        self.recent_starts.push_back(now);
    }
}

/// Shared throttle in front of every upstream call.
/// Waiters are served first come, first served.
#[derive(Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    state: Arc<Mutex<LimiterState>>,
}

/// The right to issue exactly one upstream call. No other permit is handed
/// out until this one is dropped.
pub struct RateLimitPermit {
    _state: OwnedMutexGuard<LimiterState>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            state: Arc::new(Mutex::new(LimiterState::default())),
        }
    }

    /// Wait until one more upstream call may start. Never fails, only delays.
    pub async fn acquire(&self) -> RateLimitPermit {
        let mut state = self.state.clone().lock_owned().await;

        while let Some(wait) = state.wait_needed(&self.policy, Instant::now()) {
            tracing::debug!("AniList rate limit: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        state.record_start(Instant::now());
        RateLimitPermit { _state: state }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}
