//! Error types for range-set parsing.

use thiserror::Error;

/// Result type for range-set operations.
pub type RangeResult<T> = Result<T, RangeError>;

/// Errors raised while parsing a range-set representation.
///
/// The representation crosses the wire, so malformed input is always
/// surfaced to the caller and never coerced into a nearby valid set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    /// A span bound was not a non-negative integer.
    #[error("invalid range bound `{text}`")]
    InvalidBound {
        /// The offending bound text.
        text: String,
    },

    /// A span was written high-to-low.
    #[error("descending span {lo}-{hi}")]
    Descending {
        /// Lower bound as written.
        lo: u64,
        /// Upper bound as written.
        hi: u64,
    },

    /// A span was empty (e.g. `1-3,,5-6` or a trailing comma).
    #[error("empty span in range representation")]
    EmptySpan,

    /// Spans were out of order, overlapping, or adjacent.
    ///
    /// A normalized representation lists spans ascending with at least one
    /// missing integer between consecutive spans.
    #[error("span starting at {lo} must begin after {min} to stay normalized")]
    NotNormalized {
        /// Start of the offending span.
        lo: u64,
        /// First start value that would have been accepted.
        min: u64,
    },
}

impl RangeError {
    /// Creates an invalid-bound error.
    pub fn invalid_bound(text: impl Into<String>) -> Self {
        Self::InvalidBound { text: text.into() }
    }
}
