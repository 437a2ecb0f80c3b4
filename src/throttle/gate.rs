//! Single throttling decision combining the rate limiter and the tracker.
//!
//! Callers that consult the two components separately risk enforcing them
//! in inconsistent orders across endpoints, so the gate fixes the
//! sequence: check the block first, then the rate budget, and count a
//! rate-limit refusal as a failed attempt.

use std::sync::Arc;

use tracing::debug;

use super::clock::Clock;
use super::limiter::RateLimiter;
use super::tracker::IpTracker;
use crate::config::TollgateConfig;

/// Outcome of a throttling check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Proceed with the real work
    Allow,
    /// Over the request-rate budget for the current window
    RateLimited,
    /// Locked out after accumulated failures
    Blocked,
}

/// Composes a [`RateLimiter`] and an [`IpTracker`] into one decision.
pub struct ThrottleGate {
    limiter: RateLimiter,
    tracker: IpTracker,
}

impl ThrottleGate {
    /// Build a gate from configuration, with in-memory stores.
    pub fn new(config: &TollgateConfig) -> Self {
        Self {
            limiter: RateLimiter::new(&config.rate_limit),
            tracker: IpTracker::new(&config.tracker),
        }
    }

    /// Build a gate from configuration on a shared clock, with in-memory
    /// stores.
    pub fn with_clock(config: &TollgateConfig, clock: Arc<dyn Clock>) -> Self {
        use super::store::MemoryStore;
        Self {
            limiter: RateLimiter::with_parts(
                &config.rate_limit,
                Arc::new(MemoryStore::new()),
                clock.clone(),
            ),
            tracker: IpTracker::with_parts(
                &config.tracker,
                Arc::new(MemoryStore::new()),
                clock,
            ),
        }
    }

    /// Decide whether a request from `ip` may proceed.
    ///
    /// A rate-limit refusal also counts as a failed attempt, so sustained
    /// over-budget traffic escalates into a lockout.
    pub fn check(&self, ip: &str) -> Decision {
        if self.tracker.is_blocked(ip) {
            debug!(ip = %ip, "Request refused: IP is blocked");
            return Decision::Blocked;
        }

        if self.limiter.is_rate_limited(ip) {
            self.tracker.record_failed_attempt(ip);
            debug!(ip = %ip, "Request refused: rate limit exceeded");
            return Decision::RateLimited;
        }

        Decision::Allow
    }

    /// Count a failed validation or lookup against `ip`.
    pub fn record_failure(&self, ip: &str) {
        self.tracker.record_failed_attempt(ip);
    }

    /// Clear `ip`'s failure state after a successful request.
    pub fn record_success(&self, ip: &str) {
        self.tracker.reset_attempts(ip);
    }

    /// The underlying rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The underlying failed-attempt tracker.
    pub fn tracker(&self) -> &IpTracker {
        &self.tracker
    }

    /// Evict stale records from both components. Returns the total number
    /// evicted.
    pub fn sweep(&self) -> usize {
        self.limiter.sweep() + self.tracker.sweep()
    }
}
