//! Per-IP request throttling: sliding-window rate limiting and
//! failed-attempt tracking with escalating lockouts.

pub mod clock;
mod gate;
pub mod limiter;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gate::{Decision, ThrottleGate};
pub use limiter::RateLimiter;
pub use store::{MemoryStore, RecordStore};
pub use tracker::IpTracker;
