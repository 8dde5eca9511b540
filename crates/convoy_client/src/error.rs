//! Error types for the client.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur on the cache side.
///
/// A lost commit race is *not* an error — `commit` returns `false` and the
/// caller re-checkouts. Errors here are transport failures, protocol
/// violations, and local state misuse.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or transport failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether retrying the same call may succeed.
        retryable: bool,
    },

    /// The requested version does not exist on the remote store.
    #[error("version {version} not found on the remote store")]
    NotFound {
        /// The missing version.
        version: u64,
    },

    /// The remote rejected the request as malformed.
    #[error("remote rejected the request as malformed")]
    InvalidArgument,

    /// The remote store does not accept commits (not a master).
    #[error("remote store is not a master")]
    NotMaster,

    /// A checkout was requested but the remote store has no versions.
    #[error("remote store has no versions")]
    NoVersions,

    /// `commit` called before any checkout, or with no local copy.
    #[error("commit requires a checked-out working copy")]
    CommitWithoutCheckout,

    /// `revert` called before any checkout created a backup.
    #[error("no backup available to revert to")]
    MissingBackup,

    /// The remote answered with a status outside the protocol.
    #[error("unexpected status {status} from {operation}")]
    UnexpectedStatus {
        /// The operation that received it.
        operation: &'static str,
        /// The status code.
        status: u16,
    },

    /// A range representation from the remote did not parse.
    #[error("range format error: {0}")]
    Range(#[from] convoy_range::RangeError),

    /// Local cache-slot failure.
    #[error("storage error: {0}")]
    Storage(#[from] convoy_storage::StorageError),
}

impl ClientError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// True if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { retryable: true, .. })
    }
}
