//! Observable view state.

use chrono::{DateTime, Utc};

use edupulse_common::{ErrorCategory, PresenceError, PresenceSnapshot, Severity};

/// Which snapshot form the consumer currently wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Summary,
    Details,
}

/// Consumer-facing error: message, category for styling, and the retry
/// count behind a "tried N times" annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewError {
    pub message: String,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub retries: u32,
}

impl From<&PresenceError> for ViewError {
    fn from(err: &PresenceError) -> Self {
        Self {
            message: err.to_string(),
            category: err.category(),
            severity: err.severity(),
            retries: err.retries(),
        }
    }
}

/// Everything a consumer needs to render the presence widget.
///
/// Published as a full clone on every change; the last-known-good
/// snapshot survives errors so the view never goes blank once it has
/// shown data.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub snapshot: Option<PresenceSnapshot>,
    pub connected: bool,
    pub granularity: Granularity,
    pub last_error: Option<ViewError>,
    /// Failed attempts behind the most recent fetch, successful or not.
    pub retry_count: u32,
    pub last_refreshed: Option<DateTime<Utc>>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            snapshot: None,
            connected: false,
            granularity: Granularity::Summary,
            last_error: None,
            retry_count: 0,
            last_refreshed: None,
        }
    }
}
