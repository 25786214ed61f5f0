//! Transient-failure retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use edupulse_common::{PresenceError, Result};

/// Retry budget for one fetch call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Delay before retry N is `base_delay * N`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Run `op` until it succeeds or the budget is spent.
///
/// Only transient errors are retried; anything else returns immediately.
/// On success the number of failed attempts that preceded it is returned;
/// on exhaustion the last error is annotated with the retry count.
pub(crate) async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(policy.base_delay * attempt).await;
        }
        match op(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) if attempt >= policy.max_retries => {
                return Err(err.with_retries(policy.max_retries));
            }
            Err(err) => {
                warn!(attempt, error = %err, "snapshot fetch failed, retrying");
            }
        }
        attempt += 1;
    }
}
