use thiserror::Error;

use crate::registry::ItemId;

/// Unified result type for the gridboard crate.
pub type Result<T> = std::result::Result<T, GridError>;

/// Errors surfaced by the grid engine.
///
/// Malformed imports and resource-load failures are deliberately absent:
/// those degrade the affected item in place (logged, item goes inert or
/// shows an error indicator) instead of propagating. `Backend` is for
/// host surface implementations that need to report their own failures.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("no content handler registered for kind `{0}`")]
    HandlerMissing(String),
    #[error("content handler failed for item {item}: {message}")]
    Handler { item: ItemId, message: String },
    #[error("surface backend error: {0}")]
    Backend(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
