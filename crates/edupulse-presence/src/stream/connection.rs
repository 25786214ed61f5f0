//! Background WebSocket connection task.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::auth::CredentialStore;
use crate::protocol::{WireMessage, DETAILS_CHANNEL, DETAILS_REFRESH, SUMMARY_CHANNEL, SUMMARY_REFRESH};

use super::handler::handle_frame;
use super::state::{ConnectionEvent, ConnectionState};
use super::types::{StreamCommand, StreamConfig, StreamEvent};

/// How one connected session ended.
enum SessionEnd {
    /// Handshake failed, connection dropped, or heartbeat window expired.
    Lost,
    /// Explicit disconnect command.
    Disconnected,
    /// Handle dropped; the task should exit.
    CommandsClosed,
}

/// Task that owns the connection for the lifetime of the stream handle.
///
/// Parks in Disconnected until a connect command arrives, then keeps the
/// connection alive through a bounded retry loop. Once the retry budget
/// is spent it parks in Error, silently, until the next explicit connect.
pub(crate) async fn connection_loop(
    config: StreamConfig,
    credentials: Arc<dyn CredentialStore>,
    state: Arc<RwLock<ConnectionState>>,
    events: broadcast::Sender<StreamEvent>,
    mut commands: mpsc::Receiver<StreamCommand>,
) {
    'idle: loop {
        // Wait for an explicit connect. Refresh requests are no-ops here.
        loop {
            match commands.recv().await {
                None => return,
                Some(StreamCommand::Connect) => break,
                Some(cmd) => {
                    debug!(command = ?cmd, "ignoring stream command while not connected");
                }
            }
        }
        state.write().await.apply(ConnectionEvent::ConnectRequested);

        'attempts: loop {
            match run_session(&config, &credentials, &state, &events, &mut commands).await {
                SessionEnd::CommandsClosed => return,
                SessionEnd::Disconnected => {
                    state.write().await.apply(ConnectionEvent::DisconnectRequested);
                    continue 'idle;
                }
                SessionEnd::Lost => {
                    let delay = {
                        let mut s = state.write().await;
                        s.apply(ConnectionEvent::Failed);
                        if s.can_retry(config.max_reconnect_attempts) {
                            s.apply(ConnectionEvent::RetryScheduled);
                            Some(s.next_delay(config.reconnect_base_delay))
                        } else {
                            None
                        }
                    };
                    let Some(delay) = delay else {
                        error!(
                            max = config.max_reconnect_attempts,
                            "max reconnection attempts reached, awaiting explicit connect"
                        );
                        continue 'idle;
                    };

                    info!(delay_ms = delay.as_millis() as u64, "reconnecting after delay");
                    if !responsive_sleep(delay, &state, &mut commands).await {
                        return;
                    }
                    if state.read().await.phase == super::state::ConnectionPhase::Disconnected {
                        continue 'idle;
                    }
                    continue 'attempts;
                }
            }
        }
    }
}

/// Sleep for `delay` while still honoring connect/disconnect commands.
/// Returns false when the command channel closed.
async fn responsive_sleep(
    delay: Duration,
    state: &Arc<RwLock<ConnectionState>>,
    commands: &mut mpsc::Receiver<StreamCommand>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = commands.recv() => match cmd {
                None => return false,
                Some(StreamCommand::Disconnect) => {
                    state.write().await.apply(ConnectionEvent::DisconnectRequested);
                    return true;
                }
                Some(StreamCommand::Connect) => {
                    // Skip the remaining delay and restart the budget.
                    state.write().await.apply(ConnectionEvent::ConnectRequested);
                    return true;
                }
                Some(_) => {}
            }
        }
    }
}

/// Connect once and pump the session until it ends.
async fn run_session(
    config: &StreamConfig,
    credentials: &Arc<dyn CredentialStore>,
    state: &Arc<RwLock<ConnectionState>>,
    events: &broadcast::Sender<StreamEvent>,
    commands: &mut mpsc::Receiver<StreamCommand>,
) -> SessionEnd {
    // The token is read fresh at every attempt, never cached.
    let url = config.endpoint_with_token(credentials.bearer_token().as_deref());
    info!(url = %config.ws_url, "connecting presence stream");

    let ws_stream = match tokio::time::timeout(
        config.connect_timeout,
        tokio_tungstenite::connect_async(&url),
    )
    .await
    {
        Ok(Ok((ws_stream, _))) => ws_stream,
        Ok(Err(e)) => {
            error!(error = %e, "presence stream handshake failed");
            return SessionEnd::Lost;
        }
        Err(_elapsed) => {
            error!(
                timeout_s = config.connect_timeout.as_secs(),
                "presence stream handshake timed out"
            );
            return SessionEnd::Lost;
        }
    };

    state.write().await.apply(ConnectionEvent::HandshakeSucceeded);
    let _ = events.send(StreamEvent::Connected);

    let (ws_write, mut ws_read) = ws_stream.split();
    let ws_write = Arc::new(Mutex::new(ws_write));

    // Every server-side change on these channels arrives as a full
    // snapshot, never a diff.
    send_frame(&ws_write, &WireMessage::subscribe(SUMMARY_CHANNEL)).await;
    send_frame(&ws_write, &WireMessage::subscribe(DETAILS_CHANNEL)).await;

    let heartbeat_handle = tokio::spawn(heartbeat_task(
        Arc::clone(&ws_write),
        config.heartbeat_interval,
    ));

    // Absence of any inbound frame for two heartbeat intervals means the
    // connection is dead even if the socket has not errored yet.
    let read_deadline = config.heartbeat_interval * 2;

    let end = loop {
        tokio::select! {
            msg = tokio::time::timeout(read_deadline, ws_read.next()) => match msg {
                Err(_elapsed) => {
                    warn!("no frame within heartbeat window, treating connection as dead");
                    break SessionEnd::Lost;
                }
                Ok(None) => break SessionEnd::Lost,
                Ok(Some(Ok(WsMessage::Text(text)))) => {
                    if let Some(event) = handle_frame(&text) {
                        let _ = events.send(event);
                    }
                }
                Ok(Some(Ok(WsMessage::Close(_)))) => {
                    info!("presence stream closed by server");
                    break SessionEnd::Lost;
                }
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "websocket error");
                    break SessionEnd::Lost;
                }
                Ok(Some(Ok(_))) => {}
            },
            cmd = commands.recv() => match cmd {
                None => break SessionEnd::CommandsClosed,
                Some(StreamCommand::Disconnect) => {
                    send_frame(&ws_write, &WireMessage::unsubscribe(SUMMARY_CHANNEL)).await;
                    send_frame(&ws_write, &WireMessage::unsubscribe(DETAILS_CHANNEL)).await;
                    let mut writer = ws_write.lock().await;
                    let _ = writer.send(WsMessage::Close(None)).await;
                    break SessionEnd::Disconnected;
                }
                Some(StreamCommand::RequestSummaryRefresh) => {
                    send_frame(&ws_write, &WireMessage::refresh(SUMMARY_REFRESH)).await;
                }
                Some(StreamCommand::RequestDetailsRefresh) => {
                    send_frame(&ws_write, &WireMessage::refresh(DETAILS_REFRESH)).await;
                }
                Some(StreamCommand::Connect) => {}
            }
        }
    };

    heartbeat_handle.abort();
    let _ = events.send(StreamEvent::Disconnected);
    end
}

async fn send_frame<S>(ws_write: &Arc<Mutex<S>>, msg: &WireMessage)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    if let Ok(json) = serde_json::to_string(msg) {
        let mut writer = ws_write.lock().await;
        let _ = writer.send(WsMessage::Text(json.into())).await;
    }
}

async fn heartbeat_task<S>(ws_write: Arc<Mutex<S>>, interval: Duration)
where
    S: futures_util::Sink<WsMessage> + Unpin,
{
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let Ok(json) = serde_json::to_string(&WireMessage::heartbeat()) else {
            continue;
        };
        let mut writer = ws_write.lock().await;
        if writer.send(WsMessage::Text(json.into())).await.is_err() {
            break;
        }
    }
}
