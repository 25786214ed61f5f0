/// How an error should be presented to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing, expired, or insufficient credential.
    Auth,
    /// Backend reported a failure.
    Server,
    /// Backend could not be reached at all.
    Network,
    /// Malformed payload from the stream.
    Protocol,
    /// Stream handshake or heartbeat failure.
    Connection,
}

/// Display severity for the consumer's error banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PresenceError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("server error: {message}")]
    Server { message: String, retries: u32 },

    #[error("backend unreachable: {message}")]
    Unreachable { message: String, retries: u32 },

    #[error("malformed payload: {0}")]
    Protocol(String),

    #[error("stream connection error: {0}")]
    Connection(String),
}

impl PresenceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized(_) => ErrorCategory::Auth,
            Self::Server { .. } => ErrorCategory::Server,
            Self::Unreachable { .. } => ErrorCategory::Network,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Connection(_) => ErrorCategory::Connection,
        }
    }

    /// Network failures get a softer presentation than everything else;
    /// server failures come with a manual retry affordance.
    pub fn severity(&self) -> Severity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::Server => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Number of retries that were attempted before this error surfaced.
    pub fn retries(&self) -> u32 {
        match self {
            Self::Server { retries, .. } | Self::Unreachable { retries, .. } => *retries,
            _ => 0,
        }
    }

    /// Whether the retry policy applies to this error at all.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Unreachable { .. })
    }

    /// Annotate a transient error with the retry count it exhausted.
    pub fn with_retries(self, count: u32) -> Self {
        match self {
            Self::Server { message, .. } => Self::Server {
                message,
                retries: count,
            },
            Self::Unreachable { message, .. } => Self::Unreachable {
                message,
                retries: count,
            },
            other => other,
        }
    }
}
