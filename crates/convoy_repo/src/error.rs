//! Error types for versioned stores.

use std::io;
use thiserror::Error;

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors that can occur in a versioned store.
///
/// Commit conflicts are deliberately *not* an error: they are a
/// [`crate::CommitOutcome`] value, since losing the race is a normal branch
/// for every caller.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The requested version does not exist.
    #[error("version {version} not found")]
    NotFound {
        /// The missing version.
        version: u64,
    },

    /// Disk failure while reading or persisting a version.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// On-disk state that cannot be interpreted as a version history.
    #[error("invalid store state: {message}")]
    InvalidState {
        /// Description of the problem.
        message: String,
    },
}

impl RepoError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(version: u64) -> Self {
        Self::NotFound { version }
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
