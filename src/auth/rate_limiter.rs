//! Login Rate Limiter
//! Mission: Throttle repeated login attempts per client key
//!
//! Fixed-window policy: attempts are counted per key (client identity plus
//! target owner) and a new window starts only once the configured duration
//! has elapsed. Bursts straddling a window boundary are an accepted
//! limitation of fixed windows, not a bug. Counters live behind the
//! [`AttemptStore`] port so a centralized store can replace the in-process
//! table without touching the policy; losing them on restart is a
//! documented weakening.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Configuration for login throttling.
#[derive(Clone)]
pub struct RateLimiterConfig {
    /// Attempts allowed per window before blocking.
    pub max_attempts: u32,
    /// Window duration.
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window: Duration::from_secs(300),
        }
    }
}

/// Counter state for one client key.
#[derive(Debug, Clone, Copy)]
pub struct AttemptEntry {
    pub count: u32,
    pub window_start: Instant,
}

/// Storage port for attempt counters.
///
/// `update` must apply the closure atomically per key so that concurrent
/// attempts are linearized against the threshold check: when one slot
/// remains, only one of two racing attempts may take it.
pub trait AttemptStore: Send + Sync {
    fn update(&self, key: &str, now: Instant, f: &mut dyn FnMut(&mut AttemptEntry));
    fn reset(&self, key: &str);
    /// Drop entries whose window started more than `max_age` ago.
    fn retain_recent(&self, now: Instant, max_age: Duration);
}

/// In-process counter table.
#[derive(Default)]
pub struct InMemoryAttemptStore {
    entries: Mutex<HashMap<String, AttemptEntry>>,
}

impl AttemptStore for InMemoryAttemptStore {
    fn update(&self, key: &str, now: Instant, f: &mut dyn FnMut(&mut AttemptEntry)) {
        let mut entries = self.entries.lock();
        let entry = entries.entry(key.to_string()).or_insert(AttemptEntry {
            count: 0,
            window_start: now,
        });
        f(entry);
    }

    fn reset(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn retain_recent(&self, now: Instant, max_age: Duration) {
        self.entries
            .lock()
            .retain(|_, entry| now.duration_since(entry.window_start) < max_age);
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Blocked { retry_after: Duration },
}

/// Fixed-window login limiter.
#[derive(Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    store: Arc<dyn AttemptStore>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig, store: Arc<dyn AttemptStore>) -> Self {
        Self { config, store }
    }

    /// Record one attempt for `key` and decide whether it may proceed.
    ///
    /// Attempts are counted at the gate, before any expensive hashing, so
    /// the threshold check is linearized inside the store. A successful
    /// login must call [`record_success`] to clear the counter.
    ///
    /// [`record_success`]: RateLimiter::record_success
    pub fn check_and_record(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let window = self.config.window;
        let max_attempts = self.config.max_attempts;
        let mut decision = RateDecision::Allowed;

        self.store.update(key, now, &mut |entry| {
            // Fixed window: roll over only once the full duration elapsed.
            if now.duration_since(entry.window_start) >= window {
                entry.count = 0;
                entry.window_start = now;
            }

            entry.count += 1;

            if entry.count > max_attempts {
                let reset_at = entry.window_start + window;
                decision = RateDecision::Blocked {
                    retry_after: reset_at.saturating_duration_since(now),
                };
            }
        });

        if let RateDecision::Blocked { retry_after } = decision {
            warn!(
                key,
                retry_after_secs = retry_after.as_secs(),
                "🚫 Login attempts blocked"
            );
        }

        decision
    }

    /// Clear the counter after a successful login.
    pub fn record_success(&self, key: &str) {
        self.store.reset(key);
    }

    /// Drop stale counters (call from a background task).
    pub fn cleanup(&self) {
        self.store
            .retain_recent(Instant::now(), self.config.window * 2);
    }
}
