//! Durable single-blob slots.
//!
//! A [`BlobSlot`] holds at most one byte blob and replaces it atomically.
//! The client-side repository cache keeps its working copy and its backup
//! in two slots; the blob contents are opaque to this crate.

use crate::error::StorageResult;
use parking_lot::RwLock;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// A named slot holding one byte blob.
///
/// `write` replaces the whole blob; a crash mid-write must leave either the
/// old or the new contents, never a mix.
pub trait BlobSlot: Send + Sync {
    /// Reads the blob, or `None` if the slot is empty.
    fn read(&self) -> StorageResult<Option<Vec<u8>>>;

    /// Opens a streaming reader over the blob, or `None` if the slot is
    /// empty.
    ///
    /// File-backed slots stream from disk so callers can forward large
    /// blobs without holding them in memory.
    fn reader(&self) -> StorageResult<Option<Box<dyn Read + Send + 'static>>> {
        Ok(self
            .read()?
            .map(|data| Box::new(io::Cursor::new(data)) as Box<dyn Read + Send + 'static>))
    }

    /// Atomically replaces the blob.
    fn write(&self, data: &[u8]) -> StorageResult<()>;

    /// Empties the slot. Deleting an already-empty slot is not an error.
    fn delete(&self) -> StorageResult<()>;

    /// Returns true if the slot currently holds a blob.
    fn exists(&self) -> bool;
}

/// File-backed [`BlobSlot`]: writes go to a sibling temp file which is
/// fsynced and renamed over the slot path.
#[derive(Debug)]
pub struct FileBlob {
    path: PathBuf,
}

impl FileBlob {
    /// Creates a slot at `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directories cannot be created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the slot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BlobSlot for FileBlob {
    fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn reader(&self) -> StorageResult<Option<Box<dyn Read + Send + 'static>>> {
        match fs::File::open(&self.path) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, data: &[u8]) -> StorageResult<()> {
        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        // Make the rename itself durable.
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }

    fn delete(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory [`BlobSlot`] for tests.
#[derive(Debug, Default)]
pub struct MemoryBlob {
    data: RwLock<Option<Vec<u8>>>,
}

impl MemoryBlob {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobSlot for MemoryBlob {
    fn read(&self) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().clone())
    }

    fn write(&self, data: &[u8]) -> StorageResult<()> {
        *self.data.write() = Some(data.to_vec());
        Ok(())
    }

    fn delete(&self) -> StorageResult<()> {
        *self.data.write() = None;
        Ok(())
    }

    fn exists(&self) -> bool {
        self.data.read().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_blob_lifecycle() {
        let dir = tempdir().unwrap();
        let slot = FileBlob::open(&dir.path().join("current")).unwrap();

        assert!(!slot.exists());
        assert_eq!(slot.read().unwrap(), None);

        slot.write(b"v1").unwrap();
        assert!(slot.exists());
        assert_eq!(slot.read().unwrap(), Some(b"v1".to_vec()));

        slot.write(b"version two").unwrap();
        assert_eq!(slot.read().unwrap(), Some(b"version two".to_vec()));

        slot.delete().unwrap();
        assert!(!slot.exists());
        // Deleting twice is fine.
        slot.delete().unwrap();
    }

    #[test]
    fn file_blob_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let slot = FileBlob::open(&dir.path().join("slot")).unwrap();
        slot.write(b"data").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("slot")]);
    }

    #[test]
    fn file_blob_creates_parents() {
        let dir = tempdir().unwrap();
        let slot = FileBlob::open(&dir.path().join("x").join("y").join("slot")).unwrap();
        slot.write(b"deep").unwrap();
        assert_eq!(slot.read().unwrap(), Some(b"deep".to_vec()));
    }

    #[test]
    fn memory_blob_lifecycle() {
        let slot = MemoryBlob::new();
        assert!(!slot.exists());
        slot.write(b"a").unwrap();
        assert_eq!(slot.read().unwrap(), Some(b"a".to_vec()));
        slot.delete().unwrap();
        assert_eq!(slot.read().unwrap(), None);
    }
}
