//! Server-pushed presence stream over WebSocket.
//!
//! Handles the credential-carrying handshake, channel subscriptions,
//! heartbeats in both directions, and bounded auto-reconnect. The
//! [`PresenceStream`] handle is cheap to clone; the connection itself
//! lives in a background task and is driven through commands.

mod client;
mod connection;
mod handler;
mod state;
mod types;

pub use client::PresenceStream;
pub use state::{ConnectionEvent, ConnectionPhase, ConnectionState};
pub use types::{StreamConfig, StreamEvent};

pub(crate) use types::StreamCommand;
