//! Wire types for the presence backend.
//!
//! Two surfaces share these shapes: the REST endpoints wrap every response
//! in an `{status, message, data}` envelope, and the stream speaks a small
//! JSON frame protocol of `{channel, event, payload}` messages riding on a
//! single WebSocket.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channels & destinations
// ---------------------------------------------------------------------------

/// Subscribe channel carrying count-only snapshots.
pub const SUMMARY_CHANNEL: &str = "summary-updates";
/// Subscribe channel carrying detailed snapshots.
pub const DETAILS_CHANNEL: &str = "details-updates";
/// Publish destination asking the server to re-emit the summary snapshot.
pub const SUMMARY_REFRESH: &str = "request-summary-refresh";
/// Publish destination asking the server to re-emit the detailed snapshot.
pub const DETAILS_REFRESH: &str = "request-details-refresh";

/// Frame event names.
pub mod events {
    pub const SUBSCRIBE: &str = "subscribe";
    pub const UNSUBSCRIBE: &str = "unsubscribe";
    pub const SNAPSHOT: &str = "snapshot";
    pub const REFRESH: &str = "refresh";
    pub const HEARTBEAT: &str = "heartbeat";
}

// ---------------------------------------------------------------------------
// Stream frames
// ---------------------------------------------------------------------------

/// A single frame on the presence stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub channel: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl WireMessage {
    /// Subscribe to a snapshot channel.
    pub fn subscribe(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            event: events::SUBSCRIBE.to_string(),
            payload: serde_json::json!({}),
        }
    }

    /// Leave a snapshot channel.
    pub fn unsubscribe(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            event: events::UNSUBSCRIBE.to_string(),
            payload: serde_json::json!({}),
        }
    }

    /// Empty-body refresh request published to a destination.
    pub fn refresh(destination: &str) -> Self {
        Self {
            channel: destination.to_string(),
            event: events::REFRESH.to_string(),
            payload: serde_json::json!({}),
        }
    }

    /// Outgoing heartbeat.
    pub fn heartbeat() -> Self {
        Self {
            channel: "system".to_string(),
            event: events::HEARTBEAT.to_string(),
            payload: serde_json::json!({}),
        }
    }
}

// ---------------------------------------------------------------------------
// REST envelope
// ---------------------------------------------------------------------------

/// The backend's uniform response wrapper.
///
/// `status` is an application-level code independent of the HTTP transport
/// status; a failure can arrive inside an HTTP 200.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}
