//! Public handle for the presence stream.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};

use crate::auth::CredentialStore;

use super::connection::connection_loop;
use super::state::{ConnectionPhase, ConnectionState};
use super::types::{StreamCommand, StreamConfig, StreamEvent};

/// Handle for the streaming connection.
///
/// All methods are non-blocking sends to the background connection task.
/// Clones share the same connection; events fan out to every subscriber,
/// so multiple views can watch one stream without stepping on each other.
#[derive(Clone)]
pub struct PresenceStream {
    commands: mpsc::Sender<StreamCommand>,
    events: broadcast::Sender<StreamEvent>,
    state: Arc<RwLock<ConnectionState>>,
}

impl PresenceStream {
    /// Create the handle and start the background connection task. The
    /// task stays idle until [`connect`](Self::connect) is called.
    pub fn spawn(config: StreamConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);
        let state = Arc::new(RwLock::new(ConnectionState::new()));

        tokio::spawn(connection_loop(
            config,
            credentials,
            Arc::clone(&state),
            event_tx.clone(),
            command_rx,
        ));

        Self {
            commands: command_tx,
            events: event_tx,
            state,
        }
    }

    /// Assemble a handle around externally-owned channels. Lets tests
    /// drive the event side and observe commands without a socket.
    pub(crate) fn from_parts(
        commands: mpsc::Sender<StreamCommand>,
        events: broadcast::Sender<StreamEvent>,
        state: Arc<RwLock<ConnectionState>>,
    ) -> Self {
        Self {
            commands,
            events,
            state,
        }
    }

    /// Subscribe to stream events.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Establish the connection, or restart the retry budget if the
    /// stream is parked in an error state.
    pub async fn connect(&self) {
        let _ = self.commands.send(StreamCommand::Connect).await;
    }

    /// Close the connection and stop automatic reconnects.
    pub async fn disconnect(&self) {
        let _ = self.commands.send(StreamCommand::Disconnect).await;
    }

    /// Ask the server to re-emit the current summary snapshot.
    /// No-op unless connected.
    pub async fn request_summary_refresh(&self) {
        if self.is_connected().await {
            let _ = self.commands.send(StreamCommand::RequestSummaryRefresh).await;
        }
    }

    /// Ask the server to re-emit the current detailed snapshot.
    /// No-op unless connected.
    pub async fn request_details_refresh(&self) {
        if self.is_connected().await {
            let _ = self.commands.send(StreamCommand::RequestDetailsRefresh).await;
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.state.read().await.is_connected()
    }

    pub async fn phase(&self) -> ConnectionPhase {
        self.state.read().await.phase
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.state.read().await.reconnect_attempts
    }
}
