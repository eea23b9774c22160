//! Error types for the `habitat-world` crate.
//!
//! Almost nothing in this crate can fail: unknown IDs passed to mutators are
//! reported through `bool`/`Option` returns. The one fallible surface is
//! snapshot import from JSON.

/// Errors that can occur in world operations.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A snapshot payload could not be parsed.
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
