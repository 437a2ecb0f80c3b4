//! Failed-attempt tracking with escalating per-IP lockouts.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::store::{MemoryStore, RecordStore};
use crate::config::TrackerConfig;

/// Consecutive-failure state for one IP.
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Failures since the last reset or expiry, always at least 1
    pub attempts: u32,
    /// When the most recent failure was recorded
    pub last_attempt: Instant,
    /// Lockout currently applicable to this IP
    pub block_duration: Duration,
}

/// Tracks failed attempts per IP and imposes a lockout that doubles with
/// each offence beyond the tolerated threshold. Independent of raw request
/// volume; the rate limiter covers that separately.
pub struct IpTracker {
    max_attempts: u32,
    base_block: Duration,
    message: String,
    store: Arc<dyn RecordStore<FailureRecord>>,
    clock: Arc<dyn Clock>,
}

impl IpTracker {
    /// Create a tracker with the in-memory store and the system clock.
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Create a tracker over an explicit store and clock.
    pub fn with_parts(
        config: &TrackerConfig,
        store: Arc<dyn RecordStore<FailureRecord>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_block: config.base_block(),
            message: config.message.clone(),
            store,
            clock,
        }
    }

    /// Record one failed attempt from `ip`.
    ///
    /// A record whose own block duration has lapsed counts as a fresh
    /// first offence. The first blocking offence carries the base
    /// lockout; each further failure doubles it. At or below the
    /// threshold the duration stays at base.
    pub fn record_failed_attempt(&self, ip: &str) {
        let now = self.clock.now();

        self.store.update(ip, &mut |record| match record {
            Some(record) if now.duration_since(record.last_attempt) <= record.block_duration => {
                let attempts = record.attempts.saturating_add(1);
                Some(FailureRecord {
                    attempts,
                    last_attempt: now,
                    block_duration: self.block_duration_for(attempts),
                })
            }
            _ => Some(FailureRecord {
                attempts: 1,
                last_attempt: now,
                block_duration: self.base_block,
            }),
        });

        debug!(ip = %ip, "Recorded failed attempt");
    }

    /// Whether `ip` is currently locked out.
    ///
    /// An expired record is deleted on the way through, so a later
    /// failure starts a fresh count.
    pub fn is_blocked(&self, ip: &str) -> bool {
        let now = self.clock.now();
        let mut blocked = false;

        self.store.update(ip, &mut |record| match record {
            None => None,
            Some(record) if now.duration_since(record.last_attempt) > record.block_duration => {
                None
            }
            Some(record) => {
                blocked = record.attempts > self.max_attempts;
                Some(record.clone())
            }
        });

        blocked
    }

    /// Clear all failure state for `ip`, lifting any block immediately.
    pub fn reset_attempts(&self, ip: &str) {
        self.store.remove(ip);
    }

    /// Force `ip` into the blocked state for `duration`.
    pub fn block_ip(&self, ip: &str, duration: Duration) {
        let now = self.clock.now();
        self.store.set(
            ip,
            FailureRecord {
                attempts: self.max_attempts + 1,
                last_attempt: now,
                block_duration: duration,
            },
        );
        info!(ip = %ip, duration_ms = duration.as_millis() as u64, "IP force-blocked");
    }

    /// Message returned to blocked callers.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Evict records whose block duration has lapsed. Returns the number
    /// evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.store.len();
        self.store
            .retain(&mut |_, record| now.duration_since(record.last_attempt) <= record.block_duration);
        before - self.store.len()
    }

    /// Number of IPs with a live record.
    pub fn tracked_ips(&self) -> usize {
        self.store.len()
    }

    /// Lockout applicable after `attempts` failures: the base duration up
    /// to and including the first blocking offence, doubling per failure
    /// beyond that. The exponent is clamped at zero so early attempts
    /// never shrink the lockout below base, and the arithmetic saturates
    /// rather than overflowing.
    fn block_duration_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(self.max_attempts + 1).min(32);
        let factor = 1u64 << exponent;
        let millis = (self.base_block.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttle::clock::ManualClock;

    fn tracker(max_attempts: u32, base_block_ms: u64, clock: Arc<ManualClock>) -> IpTracker {
        let config = TrackerConfig {
            max_attempts,
            base_block_ms,
            message: "blocked".to_string(),
        };
        IpTracker::with_parts(&config, Arc::new(MemoryStore::new()), clock)
    }

    #[test]
    fn test_unknown_ip_is_not_blocked() {
        let tracker = tracker(5, 60_000, ManualClock::new());
        assert!(!tracker.is_blocked("8.8.8.8"));
    }

    #[test]
    fn test_blocks_after_threshold() {
        let tracker = tracker(5, 60_000, ManualClock::new());

        for _ in 0..5 {
            tracker.record_failed_attempt("1.2.3.4");
            assert!(!tracker.is_blocked("1.2.3.4"));
        }

        tracker.record_failed_attempt("1.2.3.4");
        assert!(tracker.is_blocked("1.2.3.4"));
    }

    #[test]
    fn test_block_expires_and_record_clears() {
        let clock = ManualClock::new();
        let tracker = tracker(2, 1000, clock.clone());

        for _ in 0..3 {
            tracker.record_failed_attempt("1.2.3.4");
        }
        assert!(tracker.is_blocked("1.2.3.4"));

        clock.advance(Duration::from_millis(1001));
        assert!(!tracker.is_blocked("1.2.3.4"));
        assert_eq!(tracker.tracked_ips(), 0);

        // A later failure starts a fresh count
        tracker.record_failed_attempt("1.2.3.4");
        assert!(!tracker.is_blocked("1.2.3.4"));
    }

    #[test]
    fn test_reset_lifts_block_immediately() {
        let tracker = tracker(2, 60_000, ManualClock::new());

        for _ in 0..3 {
            tracker.record_failed_attempt("1.2.3.4");
        }
        assert!(tracker.is_blocked("1.2.3.4"));

        tracker.reset_attempts("1.2.3.4");
        assert!(!tracker.is_blocked("1.2.3.4"));
    }

    #[test]
    fn test_block_ip_takes_effect_for_given_duration() {
        let clock = ManualClock::new();
        let tracker = tracker(5, 1000, clock.clone());

        tracker.block_ip("5.6.7.8", Duration::from_millis(1_800_000));
        assert!(tracker.is_blocked("5.6.7.8"));

        clock.advance(Duration::from_millis(1_799_999));
        assert!(tracker.is_blocked("5.6.7.8"));

        clock.advance(Duration::from_millis(2));
        assert!(!tracker.is_blocked("5.6.7.8"));
    }

    #[test]
    fn test_three_failures_two_tolerated_scenario() {
        let clock = ManualClock::new();
        let tracker = tracker(2, 1000, clock.clone());

        tracker.record_failed_attempt("2.2.2.2");
        tracker.record_failed_attempt("2.2.2.2");
        assert!(!tracker.is_blocked("2.2.2.2"));

        tracker.record_failed_attempt("2.2.2.2");
        assert!(tracker.is_blocked("2.2.2.2"));

        clock.advance(Duration::from_millis(1001));
        assert!(!tracker.is_blocked("2.2.2.2"));
    }

    #[test]
    fn test_block_duration_doubles_beyond_threshold() {
        let clock = ManualClock::new();
        let tracker = tracker(2, 1000, clock.clone());

        // 4 failures: one beyond the first blocking offence, so the
        // lockout is base * 2 = 2000ms.
        for _ in 0..4 {
            tracker.record_failed_attempt("3.3.3.3");
        }
        assert!(tracker.is_blocked("3.3.3.3"));

        clock.advance(Duration::from_millis(1_999));
        assert!(tracker.is_blocked("3.3.3.3"));

        clock.advance(Duration::from_millis(2));
        assert!(!tracker.is_blocked("3.3.3.3"));
    }

    #[test]
    fn test_first_blocking_offence_keeps_base_duration() {
        let clock = ManualClock::new();
        let tracker = tracker(2, 1000, clock.clone());

        for _ in 0..3 {
            tracker.record_failed_attempt("6.6.6.6");
        }
        assert!(tracker.is_blocked("6.6.6.6"));

        // The lockout for the first offence past the threshold is exactly
        // the base duration, not a doubled one.
        clock.advance(Duration::from_millis(999));
        assert!(tracker.is_blocked("6.6.6.6"));

        clock.advance(Duration::from_millis(2));
        assert!(!tracker.is_blocked("6.6.6.6"));
    }

    #[test]
    fn test_early_attempts_keep_base_duration() {
        let clock = ManualClock::new();
        let tracker = tracker(5, 1000, clock.clone());

        // Two failures, well under the threshold: the record must expire
        // after exactly the base duration, never sooner.
        tracker.record_failed_attempt("4.4.4.4");
        tracker.record_failed_attempt("4.4.4.4");

        clock.advance(Duration::from_millis(999));
        tracker.record_failed_attempt("4.4.4.4");
        // Still within base block of the previous attempt, so the count
        // continued rather than resetting.
        clock.advance(Duration::from_millis(1001));
        tracker.record_failed_attempt("4.4.4.4");
        assert!(!tracker.is_blocked("4.4.4.4"));
    }

    #[test]
    fn test_ips_are_isolated() {
        let tracker = tracker(1, 60_000, ManualClock::new());

        tracker.record_failed_attempt("10.0.0.1");
        tracker.record_failed_attempt("10.0.0.1");
        assert!(tracker.is_blocked("10.0.0.1"));
        assert!(!tracker.is_blocked("10.0.0.2"));
    }

    #[test]
    fn test_sweep_evicts_expired_records() {
        let clock = ManualClock::new();
        let tracker = tracker(2, 1000, clock.clone());

        tracker.record_failed_attempt("10.0.0.1");
        clock.advance(Duration::from_millis(500));
        tracker.record_failed_attempt("10.0.0.2");
        assert_eq!(tracker.tracked_ips(), 2);

        clock.advance(Duration::from_millis(600));
        assert_eq!(tracker.sweep(), 1);
        assert_eq!(tracker.tracked_ips(), 1);
    }
}
