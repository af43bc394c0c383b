//! # Delegated Calls
//!
//! Timeout and bounded retry around collaborator calls.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::domain::DelegateError;

/// Run `op` with a per-attempt deadline.
///
/// Timed-out attempts are retried until `attempts` have been made. A
/// collaborator error ends the loop at once. `op` must be safe to repeat:
/// an abandoned attempt may still complete.
pub async fn call_with_retry<T, E, F, Fut>(
    call: &'static str,
    timeout: Duration,
    attempts: u32,
    op: F,
) -> Result<T, DelegateError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => return Err(DelegateError::Failed(err)),
            Err(_) => warn!(call, attempt, attempts, "Delegated call timed out"),
        }
    }
    Err(DelegateError::TimedOut { call, attempts })
}
