//! Typed domain error enums.
//!
//! All error types implement `thiserror::Error` and convert to
//! `anyhow::Error` via the `?` operator at service boundaries.

use thiserror::Error;

/// The dependency graph contains a cycle — no valid recreation order exists.
///
/// Fatal for the whole orchestration pass: no partial order is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dependency cycle detected at container '{container}'")]
pub struct CycleError {
    /// Display name of the node where the cycle was detected.
    pub container: String,
}

/// Errors from the self-update rename/replace dance.
#[derive(Debug, Error)]
pub enum SelfUpdateError {
    /// The running instance could not be renamed; the original container is
    /// untouched and the update attempt must be aborted.
    #[error("failed to rename container '{name}' to '{temp_name}': {reason}")]
    RenameFailed {
        name: String,
        temp_name: String,
        reason: String,
    },

    /// The rename was issued but the runtime does not report it as committed.
    #[error("rename of '{name}' to '{temp_name}' not visible in runtime")]
    RenameNotVisible { name: String, temp_name: String },
}
