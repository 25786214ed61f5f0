//! Injected credential capability.
//!
//! The core never caches a token beyond one call or connection attempt:
//! every REST request and every handshake reads the store fresh. Nothing
//! here assumes a storage medium, so tests run with in-memory credentials.

use std::sync::RwLock;

/// Read access to the caller's bearer token.
pub trait CredentialStore: Send + Sync {
    /// Current bearer token, if any. Absent means unauthenticated.
    fn bearer_token(&self) -> Option<String>;

    /// Drop the stored credential. Called when the backend rejects the
    /// session as unauthorized, after a short user-visible delay.
    fn invalidate(&self);
}

/// In-memory credential store.
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            token: RwLock::new(None),
        }
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write().expect("credential lock poisoned") = Some(token.into());
    }
}

impl CredentialStore for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().expect("credential lock poisoned").clone()
    }

    fn invalidate(&self) {
        *self.token.write().expect("credential lock poisoned") = None;
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let present = self
            .token
            .read()
            .map(|t| t.is_some())
            .unwrap_or(false);
        f.debug_struct("StaticCredentials")
            .field("token", &if present { "[REDACTED]" } else { "<none>" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_reads_are_fresh() {
        let creds = StaticCredentials::new("abc");
        assert_eq!(creds.bearer_token().as_deref(), Some("abc"));

        creds.set_token("def");
        assert_eq!(creds.bearer_token().as_deref(), Some("def"));
    }

    #[test]
    fn invalidate_clears_token() {
        let creds = StaticCredentials::new("abc");
        creds.invalidate();
        assert!(creds.bearer_token().is_none());
    }

    #[test]
    fn debug_never_prints_token() {
        let creds = StaticCredentials::new("super-secret");
        let out = format!("{creds:?}");
        assert!(!out.contains("super-secret"));
        assert!(out.contains("[REDACTED]"));

        let out = format!("{:?}", StaticCredentials::anonymous());
        assert!(out.contains("<none>"));
    }
}
