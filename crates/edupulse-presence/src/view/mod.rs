//! Reconciled presence view.
//!
//! Single source of truth for consumers: folds push snapshots from the
//! stream and pull snapshots from the REST fallback into one observable
//! state, arbitrating which transport serves each user intent.

mod model;
mod types;

pub use model::{PresenceViewModel, ViewConfig};
pub use types::{Granularity, ViewError, ViewState};
