//! Presence snapshot data model.
//!
//! These types mirror the backend's JSON shapes (camelCase on the wire).
//! A snapshot is always a full state, never a diff: the summary form
//! carries only the count, the detailed form additionally lists every
//! connected principal.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PresenceError;

/// Principal role as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Standard,
    Privileged,
}

/// One currently-connected principal in a detailed snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub subject_id: String,
    pub display_name: String,
    pub role: Role,
    pub connected_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// A full presence snapshot as computed by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSnapshot {
    pub total_online: u32,
    pub as_of: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<PresenceEntry>>,
}

impl PresenceSnapshot {
    /// Summary snapshot with no per-principal details.
    pub fn summary(total_online: u32, as_of: DateTime<Utc>) -> Self {
        Self {
            total_online,
            as_of,
            details: None,
        }
    }

    /// Degraded snapshot shown when the backend is unreachable and no
    /// prior data exists. Zero count; empty details when the detailed
    /// form is wanted.
    pub fn fallback(detailed: bool) -> Self {
        Self {
            total_online: 0,
            as_of: Utc::now(),
            details: detailed.then(Vec::new),
        }
    }

    pub fn is_detailed(&self) -> bool {
        self.details.is_some()
    }

    /// Check the structural invariants that every valid snapshot holds.
    ///
    /// Decoded payloads — both REST and push — go through this before
    /// they are applied anywhere.
    pub fn validate(&self) -> Result<(), PresenceError> {
        let Some(details) = &self.details else {
            return Ok(());
        };

        if details.len() != self.total_online as usize {
            return Err(PresenceError::Protocol(format!(
                "totalOnline {} does not match {} detail entries",
                self.total_online,
                details.len()
            )));
        }

        let mut seen = HashSet::new();
        for entry in details {
            if !seen.insert(entry.subject_id.as_str()) {
                return Err(PresenceError::Protocol(format!(
                    "duplicate subjectId {}",
                    entry.subject_id
                )));
            }
            if entry.last_activity_at < entry.connected_at {
                return Err(PresenceError::Protocol(format!(
                    "subjectId {} has lastActivityAt before connectedAt",
                    entry.subject_id
                )));
            }
        }
        Ok(())
    }

    /// Fold a summary snapshot into this one, keeping held details.
    ///
    /// Count-only updates must not wipe a detailed listing the consumer
    /// is already showing; the count and timestamp move forward, the
    /// entries stay until the next detailed snapshot replaces them.
    pub fn apply_summary(&mut self, summary: &PresenceSnapshot) {
        self.total_online = summary.total_online;
        self.as_of = summary.as_of;
    }
}
