//! Configuration and result types for the snapshot fetcher.

use std::time::Duration;

use edupulse_common::PresenceSnapshot;

use super::retry::RetryPolicy;

/// Configuration for the REST snapshot fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Backend base URL, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Per-request timeout. Exceeding it counts as unreachable.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl FetchConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(12),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A successful fetch, annotated with how many attempts failed first.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub snapshot: PresenceSnapshot,
    pub failed_attempts: u32,
}
