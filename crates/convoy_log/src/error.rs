//! Error types for the event log.

use std::io;
use thiserror::Error;

/// Result type for log operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors that can occur in the event log.
#[derive(Debug, Error)]
pub enum LogError {
    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(#[from] convoy_storage::StorageError),

    /// I/O failure outside a backend (directory handling, locking).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Event payload (de)serialization failure.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },

    /// A segment's framing is damaged beyond the repairable tail.
    #[error("corrupt segment: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the log root.
    #[error("log root is locked by another process")]
    Locked,

    /// An append would break the strictly-increasing event ID order.
    #[error("event ID {attempted} not greater than last appended ID {last}")]
    EventIdOrder {
        /// Highest ID already in the segment.
        last: u64,
        /// The rejected ID.
        attempted: u64,
    },

    /// An event carried an unusable identity (empty target, zero store ID).
    #[error("invalid event: {message}")]
    InvalidEvent {
        /// What was wrong with the event.
        message: String,
    },

    /// An event payload exceeds the frame size limit.
    #[error("event payload of {len} bytes exceeds the {max} byte limit")]
    EventTooLarge {
        /// Encoded payload size.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl LogError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates an invalid-event error.
    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            message: message.into(),
        }
    }
}
