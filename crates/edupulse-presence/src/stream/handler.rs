//! Incoming frame handling.

use edupulse_common::PresenceSnapshot;
use tracing::{debug, warn};

use crate::protocol::{events, WireMessage, DETAILS_CHANNEL, SUMMARY_CHANNEL};

use super::types::StreamEvent;

/// Translate one inbound text frame into a stream event.
///
/// Anything malformed is logged and dropped; the stream must survive a
/// bad payload.
pub(crate) fn handle_frame(text: &str) -> Option<StreamEvent> {
    let msg: WireMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(error = %e, "unparseable frame, dropping");
            return None;
        }
    };

    match msg.event.as_str() {
        events::SNAPSHOT => snapshot_event(&msg),
        events::HEARTBEAT => {
            debug!("heartbeat from server");
            None
        }
        other => {
            debug!(channel = %msg.channel, event = %other, "unhandled frame event");
            None
        }
    }
}

fn snapshot_event(msg: &WireMessage) -> Option<StreamEvent> {
    let snapshot: PresenceSnapshot = match serde_json::from_value(msg.payload.clone()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(channel = %msg.channel, error = %e, "malformed snapshot payload, dropping");
            return None;
        }
    };
    if let Err(e) = snapshot.validate() {
        warn!(channel = %msg.channel, error = %e, "snapshot violates invariants, dropping");
        return None;
    }

    match msg.channel.as_str() {
        SUMMARY_CHANNEL => Some(StreamEvent::SummarySnapshot(snapshot)),
        DETAILS_CHANNEL => {
            if !snapshot.is_detailed() {
                warn!("details channel pushed a snapshot without details, dropping");
                return None;
            }
            Some(StreamEvent::DetailsSnapshot(snapshot))
        }
        other => {
            debug!(channel = %other, "snapshot on unknown channel");
            None
        }
    }
}
