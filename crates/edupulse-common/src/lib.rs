pub mod errors;
pub mod types;

pub use errors::{ErrorCategory, PresenceError, Severity};
pub use types::{PresenceEntry, PresenceSnapshot, Role};

pub type Result<T> = std::result::Result<T, PresenceError>;
