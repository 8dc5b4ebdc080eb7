use thiserror::Error;

use crate::host::HostError;

/// Failure taxonomy of the public engine operations.
///
/// Not-found conditions are surfaced to the caller, never silently ignored
/// (the one documented exception is `delete_bookmark_and_content`, whose
/// absence case is a no-op by contract). Invariant violations are defects:
/// they abort the current operation without partial repair and are not meant
/// to be caught and retried. Host failures propagate unchanged. No operation
/// retries internally; structural edits are not idempotent to repeat blindly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bookmark not found: {0}")]
    BookmarkNotFound(String),
    #[error("building block not found: {0}")]
    BlockNotFound(String),
    #[error("bookmark already exists: {0}")]
    DuplicateBookmark(String),
    #[error("structural invariant violated: {0}")]
    InvariantViolation(String),
    #[error("host primitive failed: {0}")]
    Host(#[from] HostError),
}
