//! File-backed byte store.

use crate::error::{StorageError, StorageResult};
use crate::store::ByteStore;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// A durable, file-backed [`ByteStore`].
///
/// Reads use positional I/O (`pread`), so any number of concurrent readers
/// proceed without taking a lock; only appends and truncates serialize on an
/// internal mutex. Data survives process restarts once `sync` has returned.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    file: File,
    /// Serializes append/truncate; guards `size` transitions.
    write_lock: Mutex<()>,
    size: AtomicU64,
}

impl FileStore {
    /// Opens or creates a file store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            write_lock: Mutex::new(()),
            size: AtomicU64::new(size),
        })
    }

    /// Opens a file store, creating parent directories as needed.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ByteStore for FileStore {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = self.size.load(Ordering::Acquire);
        let end = offset.saturating_add(len as u64);
        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut buffer = vec![0u8; len];
        self.file.read_exact_at(&mut buffer, offset)?;
        Ok(buffer)
    }

    fn append(&self, data: &[u8]) -> StorageResult<u64> {
        let _guard = self.write_lock.lock();
        let offset = self.size.load(Ordering::Acquire);
        if !data.is_empty() {
            self.file.write_all_at(data, offset)?;
            self.size
                .store(offset + data.len() as u64, Ordering::Release);
        }
        Ok(offset)
    }

    fn len(&self) -> StorageResult<u64> {
        Ok(self.size.load(Ordering::Acquire))
    }

    fn truncate(&self, new_len: u64) -> StorageResult<()> {
        let _guard = self.write_lock.lock();
        let size = self.size.load(Ordering::Acquire);
        if new_len > size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: new_len,
                size,
            });
        }
        self.file.set_len(new_len)?;
        self.file.sync_all()?;
        self.size.store(new_len, Ordering::Release);
        Ok(())
    }

    fn sync(&self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 0);

        assert_eq!(store.append(b"hello").unwrap(), 0);
        assert_eq!(store.append(b" world").unwrap(), 5);
        assert_eq!(store.len().unwrap(), 11);
        assert_eq!(store.read_at(0, 11).unwrap(), b"hello world");
        assert_eq!(store.read_at(6, 5).unwrap(), b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("s")).unwrap();
        store.append(b"abc").unwrap();

        assert!(matches!(
            store.read_at(2, 5),
            Err(StorageError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            store.read_at(10, 1),
            Err(StorageError::ReadPastEnd { .. })
        ));
    }

    #[test]
    fn empty_append_and_read() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("s")).unwrap();
        store.append(b"x").unwrap();

        assert_eq!(store.append(b"").unwrap(), 1);
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.read_at(1, 0).unwrap().is_empty());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.bin");
        {
            let store = FileStore::open(&path).unwrap();
            store.append(b"durable").unwrap();
            store.sync().unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.len().unwrap(), 7);
        assert_eq!(store.read_at(0, 7).unwrap(), b"durable");
    }

    #[test]
    fn truncate_drops_tail() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(&dir.path().join("s")).unwrap();
        store.append(b"hello world").unwrap();

        store.truncate(5).unwrap();
        assert_eq!(store.len().unwrap(), 5);
        assert_eq!(store.read_at(0, 5).unwrap(), b"hello");

        assert!(matches!(
            store.truncate(100),
            Err(StorageError::TruncateBeyondEnd { .. })
        ));
    }

    #[test]
    fn creates_nested_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("store.bin");
        let store = FileStore::open_with_create_dirs(&path).unwrap();
        assert_eq!(store.len().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn concurrent_readers_during_appends() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::open(&dir.path().join("s")).unwrap());

        let writer = {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..100u8 {
                    store.append(&[i; 16]).unwrap();
                }
            })
        };
        let reader = {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..100 {
                    let size = store.len().unwrap();
                    if size >= 16 {
                        // Whatever is visible must read back intact.
                        let chunk = store.read_at(0, 16).unwrap();
                        assert_eq!(chunk, vec![0u8; 16]);
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.len().unwrap(), 1600);
    }
}
