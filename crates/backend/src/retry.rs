//! Transient-contention retry loop.
//!
//! Reads and writes that hit a busy lock held by a concurrent writer are
//! retried with capped exponential backoff. Callers see added latency,
//! never the contention error itself, unless the policy bounds attempts.

use std::thread;

use tracing::{debug, warn};

use crate::{error::Result, options::RetryPolicy};

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempt bound is reached.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient error when
/// `max_attempts` is exhausted.
pub fn retry_transient<T>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt: u32 = 1;
    loop {
        match op() {
            Err(err) if err.is_transient() => {
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    warn!(operation, attempt, error = %err, "Giving up after transient errors");
                    return Err(err);
                }
                let delay = policy.backoff_for(attempt);
                debug!(operation, attempt, ?delay, error = %err, "Retrying after transient error");
                thread::sleep(delay);
                attempt = attempt.saturating_add(1);
            }
            result => return result,
        }
    }
}
