//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-oriented byte store with positional reads.
///
/// All methods take `&self`: implementations use interior mutability so that
/// readers holding their own offsets never contend with the append path.
/// This is what lets log scans run concurrently with a writer on the same
/// store.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, and appends from
///   concurrent callers never interleave within one call.
/// - `read_at` returns exactly the bytes previously written at that offset,
///   or [`crate::StorageError::ReadPastEnd`] when the range is not (yet)
///   fully present.
/// - `sync` makes all previously appended data durable.
/// - `truncate` discards everything at and after the new length; it is used
///   by crash repair to drop a torn tail.
pub trait ByteStore: Send + Sync {
    /// Reads exactly `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::ReadPastEnd`] if the requested range
    /// extends beyond the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data`, returning the offset it was written at.
    fn append(&self, data: &[u8]) -> StorageResult<u64>;

    /// Current size in bytes; the offset the next `append` will use.
    fn len(&self) -> StorageResult<u64>;

    /// Returns true if the store holds no bytes.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncates the store to `new_len` bytes.
    ///
    /// # Errors
    ///
    /// Fails if `new_len` exceeds the current size.
    fn truncate(&self, new_len: u64) -> StorageResult<()>;

    /// Forces all appended data (and metadata) to durable storage.
    fn sync(&self) -> StorageResult<()>;
}
