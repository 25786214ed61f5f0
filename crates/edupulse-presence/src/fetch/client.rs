//! REST snapshot fetcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use edupulse_common::{PresenceError, PresenceSnapshot, Result};

use crate::auth::CredentialStore;
use crate::protocol::ApiEnvelope;

use super::retry::with_retry;
use super::types::{FetchConfig, FetchOutcome};

const SUMMARY_PATH: &str = "/presence/summary";
const DETAILS_PATH: &str = "/presence/details";

/// One-shot snapshot source, used before the stream is up and as the
/// fallback whenever it is down.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch a count-only snapshot.
    async fn fetch_summary(&self) -> Result<FetchOutcome>;
    /// Fetch a snapshot with per-principal details.
    async fn fetch_details(&self) -> Result<FetchOutcome>;
}

/// Stateless REST client for the presence endpoints.
pub struct SnapshotFetcher {
    config: FetchConfig,
    credentials: Arc<dyn CredentialStore>,
    http: reqwest::Client,
}

impl SnapshotFetcher {
    pub fn new(config: FetchConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            credentials,
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_once(&self, path: &str) -> Result<PresenceSnapshot> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(url = %url, "presence fetch");

        let mut request = self.http.get(&url).timeout(self.config.timeout);
        // Token is read fresh on every call, never cached here.
        if let Some(token) = self.credentials.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| PresenceError::Unreachable {
            message: e.to_string(),
            retries: 0,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| PresenceError::Unreachable {
            message: e.to_string(),
            retries: 0,
        })?;

        if let Some(err) = classify_http_status(status, &body) {
            return Err(err);
        }

        let envelope: ApiEnvelope<PresenceSnapshot> = serde_json::from_str(&body)
            .map_err(|e| PresenceError::Protocol(e.to_string()))?;
        decode_envelope(envelope)
    }

    async fn fetch_with_retry(&self, path: &str) -> Result<FetchOutcome> {
        let (snapshot, failed_attempts) =
            with_retry(&self.config.retry, |_| self.fetch_once(path)).await?;
        Ok(FetchOutcome {
            snapshot,
            failed_attempts,
        })
    }
}

#[async_trait]
impl SnapshotSource for SnapshotFetcher {
    async fn fetch_summary(&self) -> Result<FetchOutcome> {
        self.fetch_with_retry(SUMMARY_PATH).await
    }

    async fn fetch_details(&self) -> Result<FetchOutcome> {
        self.fetch_with_retry(DETAILS_PATH).await
    }
}

/// Map a non-success HTTP status to the error taxonomy.
///
/// The body is consulted for an envelope `message` so the user-facing
/// text comes from the backend when it sent one.
fn classify_http_status(status: reqwest::StatusCode, body: &str) -> Option<PresenceError> {
    if status.is_success() {
        return None;
    }
    let message = envelope_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    Some(match status.as_u16() {
        401 | 403 => PresenceError::Unauthorized(message),
        _ => PresenceError::Server {
            message,
            retries: 0,
        },
    })
}

/// Unwrap the application-level envelope into a validated snapshot.
fn decode_envelope(envelope: ApiEnvelope<PresenceSnapshot>) -> Result<PresenceSnapshot> {
    match envelope.status {
        200 => {}
        401 | 403 => {
            return Err(PresenceError::Unauthorized(
                envelope.message.unwrap_or_else(|| "access denied".into()),
            ));
        }
        status => {
            return Err(PresenceError::Server {
                message: envelope
                    .message
                    .unwrap_or_else(|| format!("backend status {status}")),
                retries: 0,
            });
        }
    }

    let snapshot = envelope
        .data
        .ok_or_else(|| PresenceError::Protocol("envelope missing data".into()))?;
    snapshot.validate()?;
    Ok(snapshot)
}

fn envelope_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|env| env.message)
}
