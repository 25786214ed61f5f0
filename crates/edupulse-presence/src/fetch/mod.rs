//! Pull-based REST fallback for presence snapshots.
//!
//! Each fetch is an independent one-shot request with its own retry
//! budget: transient failures (5xx, network) are retried with a linearly
//! growing delay, authorization failures are not. Callers get the number
//! of failed attempts back alongside the result either way.

mod client;
mod retry;
mod types;

pub use client::{SnapshotFetcher, SnapshotSource};
pub use retry::RetryPolicy;
pub use types::{FetchConfig, FetchOutcome};
