//! Sliding-window rate limiter keyed by client IP.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::store::{MemoryStore, RecordStore};
use crate::config::RateLimitConfig;

/// Request count within the current window for one IP.
///
/// A record older than the window length is treated as absent and is
/// replaced, not incremented, on next access.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    /// Requests observed in the current window, always at least 1
    pub count: u64,
    /// When the first counted request arrived
    pub window_start: Instant,
}

/// Counts requests per IP within a rolling window and flags callers that
/// exceed the configured ceiling.
pub struct RateLimiter {
    window: Duration,
    max_requests: u64,
    message: String,
    store: Arc<dyn RecordStore<WindowRecord>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter with the in-memory store and the system clock.
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Create a rate limiter over an explicit store and clock.
    pub fn with_parts(
        config: &RateLimitConfig,
        store: Arc<dyn RecordStore<WindowRecord>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
            message: config.message.clone(),
            store,
            clock,
        }
    }

    /// Count a request from `ip` and report whether it is over budget.
    ///
    /// Always mutates: the record is created on first contact, replaced
    /// when the window has lapsed, and incremented otherwise. Exactly
    /// `max_requests` requests pass within one window; the next is
    /// refused.
    pub fn is_rate_limited(&self, ip: &str) -> bool {
        let now = self.clock.now();
        let mut limited = false;

        self.store.update(ip, &mut |record| match record {
            None => {
                trace!(ip = %ip, "First request in window");
                Some(WindowRecord {
                    count: 1,
                    window_start: now,
                })
            }
            Some(record) if now.duration_since(record.window_start) > self.window => {
                trace!(ip = %ip, "Window expired, resetting count");
                Some(WindowRecord {
                    count: 1,
                    window_start: now,
                })
            }
            Some(record) => {
                let count = record.count + 1;
                limited = count > self.max_requests;
                Some(WindowRecord {
                    count,
                    window_start: record.window_start,
                })
            }
        });

        if limited {
            debug!(ip = %ip, max_requests = self.max_requests, "Rate limit exceeded");
        }
        limited
    }

    /// Message returned to limited callers.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Evict records whose window has lapsed. Returns the number evicted.
    ///
    /// Stale records are otherwise only replaced on next access from the
    /// same IP, so an attacker rotating addresses grows the map without
    /// bound.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.store.len();
        self.store
            .retain(&mut |_, record| now.duration_since(record.window_start) <= self.window);
        before - self.store.len()
    }

    /// Number of IPs with a live record.
    pub fn tracked_ips(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::clock::ManualClock;

    fn limiter(max_requests: u64, window_ms: u64, clock: Arc<ManualClock>) -> RateLimiter {
        let config = RateLimitConfig {
            window_ms,
            max_requests,
            message: "limited".to_string(),
        };
        RateLimiter::with_parts(&config, Arc::new(MemoryStore::new()), clock)
    }

    #[test]
    fn test_first_request_is_not_limited() {
        let limiter = limiter(5, 60_000, ManualClock::new());
        assert!(!limiter.is_rate_limited("9.9.9.9"));
        assert_eq!(limiter.tracked_ips(), 1);
    }

    #[test]
    fn test_exactly_max_requests_pass() {
        let limiter = limiter(5, 60_000, ManualClock::new());

        for _ in 0..5 {
            assert!(!limiter.is_rate_limited("1.2.3.4"));
        }
        // The 6th request within the window is refused
        assert!(limiter.is_rate_limited("1.2.3.4"));
    }

    #[test]
    fn test_window_reset_clears_count() {
        let clock = ManualClock::new();
        let limiter = limiter(5, 60_000, clock.clone());

        for _ in 0..6 {
            limiter.is_rate_limited("1.2.3.4");
        }
        assert!(limiter.is_rate_limited("1.2.3.4"));

        // Strictly past the window the count starts over
        clock.advance(Duration::from_millis(60_001));
        assert!(!limiter.is_rate_limited("1.2.3.4"));
    }

    #[test]
    fn test_window_boundary_is_strict() {
        let clock = ManualClock::new();
        let limiter = limiter(1, 1000, clock.clone());

        assert!(!limiter.is_rate_limited("1.2.3.4"));
        // Exactly at the window length the old window still applies
        clock.advance(Duration::from_millis(1000));
        assert!(limiter.is_rate_limited("1.2.3.4"));
    }

    #[test]
    fn test_ips_are_isolated() {
        let limiter = limiter(2, 60_000, ManualClock::new());

        for _ in 0..3 {
            limiter.is_rate_limited("10.0.0.1");
        }
        assert!(limiter.is_rate_limited("10.0.0.1"));
        assert!(!limiter.is_rate_limited("10.0.0.2"));
    }

    #[test]
    fn test_limit_two_window_one_second_scenario() {
        let clock = ManualClock::new();
        let limiter = limiter(2, 1000, clock.clone());

        // t=0, t=100, t=200
        assert!(!limiter.is_rate_limited("1.1.1.1"));
        clock.advance(Duration::from_millis(100));
        assert!(!limiter.is_rate_limited("1.1.1.1"));
        clock.advance(Duration::from_millis(100));
        assert!(limiter.is_rate_limited("1.1.1.1"));

        // t=1200: window has reset
        clock.advance(Duration::from_millis(1000));
        assert!(!limiter.is_rate_limited("1.1.1.1"));
    }

    #[test]
    fn test_sweep_evicts_stale_records() {
        let clock = ManualClock::new();
        let limiter = limiter(5, 1000, clock.clone());

        limiter.is_rate_limited("10.0.0.1");
        clock.advance(Duration::from_millis(500));
        limiter.is_rate_limited("10.0.0.2");
        assert_eq!(limiter.tracked_ips(), 2);

        clock.advance(Duration::from_millis(600));
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_ips(), 1);
    }
}
