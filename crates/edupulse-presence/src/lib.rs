//! Presence synchronization for the EduPulse admin surface.
//!
//! Keeps an online-user view in sync with the backend over two transports:
//! - a long-lived WebSocket stream ([`stream::PresenceStream`]) that pushes
//!   full snapshots on every server-side change, and
//! - a REST fallback ([`fetch::SnapshotFetcher`]) with transient-failure
//!   retry, used before the stream is up and whenever it drops.
//!
//! [`view::PresenceViewModel`] reconciles the two into a single observable
//! state the consumer subscribes to.

pub mod auth;
pub mod fetch;
pub mod protocol;
pub mod stream;
pub mod view;

pub use auth::{CredentialStore, StaticCredentials};
pub use fetch::{FetchConfig, FetchOutcome, SnapshotFetcher, SnapshotSource};
pub use stream::{ConnectionPhase, PresenceStream, StreamConfig, StreamEvent};
pub use view::{Granularity, PresenceViewModel, ViewConfig, ViewError, ViewState};
