//! Configuration, events, and commands for the presence stream.

use std::time::Duration;

use edupulse_common::PresenceSnapshot;

/// Configuration for the streaming connection.
#[derive(Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws/presence`.
    pub ws_url: String,
    /// Outgoing heartbeat interval. Reads are considered dead after
    /// twice this interval without any inbound frame.
    pub heartbeat_interval: Duration,
    /// Base reconnect delay; retry N waits `base * N`.
    pub reconnect_base_delay: Duration,
    /// Automatic reconnects stop after this many consecutive failures.
    pub max_reconnect_attempts: u32,
    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl StreamConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            heartbeat_interval: Duration::from_secs(4),
            reconnect_base_delay: Duration::from_secs(1),
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(15),
        }
    }

    /// Endpoint with the bearer token attached to the handshake.
    pub(crate) fn endpoint_with_token(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("{}?access_token={token}", self.ws_url),
            None => self.ws_url.clone(),
        }
    }
}

impl std::fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConfig")
            .field("ws_url", &self.ws_url)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("reconnect_base_delay", &self.reconnect_base_delay)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Events emitted by the stream for subscribers.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Handshake completed and channels are subscribed.
    Connected,
    /// Connection lost or closed; reconnection may follow.
    Disconnected,
    /// Full count-only snapshot pushed on the summary channel.
    SummarySnapshot(PresenceSnapshot),
    /// Full detailed snapshot pushed on the details channel.
    DetailsSnapshot(PresenceSnapshot),
}

/// Commands sent from the handle to the connection task.
#[derive(Debug)]
pub(crate) enum StreamCommand {
    Connect,
    Disconnect,
    RequestSummaryRefresh,
    RequestDetailsRefresh,
}
