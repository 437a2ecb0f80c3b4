//! Deadline helpers for racing slow downstream operations.
//!
//! The lookup endpoint bounds its database call with a wall-clock
//! deadline and answers "service unavailable" instead of hanging. The
//! raced operation is not cancelled in any deeper sense than being
//! dropped by the loser of the race.

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, TollgateError};

/// Run `operation` against a deadline.
///
/// Returns the operation's output if it settles first, or
/// [`TollgateError::Timeout`] if the deadline fires first.
pub async fn with_deadline<F, T>(deadline: Duration, operation: F) -> Result<T>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(output) => Ok(output),
        Err(_) => Err(TollgateError::Timeout),
    }
}

/// Run `operation` against a deadline, resolving with `fallback` if the
/// deadline fires first. For callers that prefer a degraded-but-successful
/// result over an error.
pub async fn with_fallback<F, T>(deadline: Duration, fallback: T, operation: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(output) => output,
        Err(_) => fallback,
    }
}
