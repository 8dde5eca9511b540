//! In-memory byte store for tests.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use parking_lot::RwLock;

/// An in-memory [`ByteStore`].
///
/// Suitable for unit tests and ephemeral stores; nothing survives the
/// process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store preloaded with `data`.
    ///
    /// Useful for reconstructing crash scenarios byte-by-byte.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Copies out the full contents.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl ByteStore for MemoryStore {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let start = offset as usize;
        let end = start.saturating_add(len);
        if offset > size || end > data.len() {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        Ok(data[start..end].to_vec())
    }

    fn append(&self, new_data: &[u8]) -> StorageResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(new_data);
        Ok(offset)
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn truncate(&self, new_len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_len > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size,
            });
        }
        data.truncate(new_len as usize);
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read() {
        let store = MemoryStore::new();
        assert_eq!(store.append(b"hello").unwrap(), 0);
        assert_eq!(store.append(b" world").unwrap(), 5);
        assert_eq!(store.read_at(0, 5).unwrap(), b"hello");
        assert_eq!(store.read_at(6, 5).unwrap(), b"world");
        assert_eq!(store.len().unwrap(), 11);
    }

    #[test]
    fn read_past_end_fails() {
        let store = MemoryStore::new();
        store.append(b"abc").unwrap();
        assert!(matches!(
            store.read_at(1, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn preloaded_data() {
        let store = MemoryStore::with_data(b"seed".to_vec());
        assert_eq!(store.len().unwrap(), 4);
        assert_eq!(store.read_at(0, 4).unwrap(), b"seed");
    }

    #[test]
    fn truncate() {
        let store = MemoryStore::new();
        store.append(b"hello world").unwrap();
        store.truncate(5).unwrap();
        assert_eq!(store.data(), b"hello");
        assert!(store.truncate(50).is_err());
    }
}
