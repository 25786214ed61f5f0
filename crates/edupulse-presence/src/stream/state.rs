//! Connection state machine.
//!
//! Reconnect accounting is a value, not a pile of mutable fields on the
//! client: the connection loop owns one `ConnectionState` and moves it
//! exclusively through `apply`, so the retry/backoff behavior is fully
//! testable without a transport.

use std::time::Duration;

/// Lifecycle phase of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection and none wanted. Initial phase; also terminal after
    /// an explicit disconnect.
    Disconnected,
    /// Handshake (or a scheduled retry) in flight.
    Connecting,
    /// Stream is live and subscribed.
    Connected,
    /// Last attempt failed. Transient while retries remain, parked once
    /// they are spent.
    Error,
}

/// The only inputs that move the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Explicit `connect()`; resets the retry budget.
    ConnectRequested,
    /// Automatic retry scheduled after a failure.
    RetryScheduled,
    /// Handshake completed.
    HandshakeSucceeded,
    /// Handshake or established connection failed.
    Failed,
    /// Explicit `disconnect()`.
    DisconnectRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionState {
    pub phase: ConnectionPhase,
    pub reconnect_attempts: u32,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Disconnected,
            reconnect_attempts: 0,
        }
    }

    pub fn apply(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::ConnectRequested => {
                self.phase = ConnectionPhase::Connecting;
                self.reconnect_attempts = 0;
            }
            ConnectionEvent::RetryScheduled => {
                self.phase = ConnectionPhase::Connecting;
                self.reconnect_attempts += 1;
            }
            ConnectionEvent::HandshakeSucceeded => {
                self.phase = ConnectionPhase::Connected;
                self.reconnect_attempts = 0;
            }
            ConnectionEvent::Failed => {
                self.phase = ConnectionPhase::Error;
            }
            ConnectionEvent::DisconnectRequested => {
                self.phase = ConnectionPhase::Disconnected;
                self.reconnect_attempts = 0;
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Whether another automatic retry may be scheduled.
    pub fn can_retry(&self, max_attempts: u32) -> bool {
        self.reconnect_attempts < max_attempts
    }

    /// Delay before the attempt that was just scheduled. Linear in the
    /// attempt number: retry N waits `base * N`.
    pub fn next_delay(&self, base: Duration) -> Duration {
        base * self.reconnect_attempts.max(1)
    }
}
