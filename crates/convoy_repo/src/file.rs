//! File-backed versioned store.

use crate::error::{RepoError, RepoResult};
use crate::store::{CommitOutcome, VersionedStore};
use convoy_range::RangeSet;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of version payload files (`v<N>.blob`).
const BLOB_SUFFIX: &str = ".blob";

/// A durable [`VersionedStore`]: one payload file per version in a
/// directory, plus a per-store mutex making the read-highest-then-write
/// commit sequence atomic.
///
/// Committed files are immutable, so `checkout` and `range` never take the
/// commit lock. A commit writes the payload to a temp file, fsyncs it, and
/// renames it into place before acknowledging, so an acknowledged version
/// survives a crash.
pub struct FileVersionedStore {
    dir: PathBuf,
    /// Highest committed version; guards the commit critical section.
    highest: Mutex<u64>,
}

impl FileVersionedStore {
    /// Opens (or creates) a store in `dir`, recovering the highest version
    /// from the payload files present.
    pub fn open(dir: &Path) -> RepoResult<Self> {
        fs::create_dir_all(dir)?;

        let mut versions: Vec<u64> = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(version) = parse_blob_name(name) {
                versions.push(version);
            }
        }
        versions.sort_unstable();

        let highest = versions.last().copied().unwrap_or(0);
        if versions.len() as u64 != highest {
            // Versions are only ever appended, so a gap means someone
            // tampered with the directory. The surviving highest version
            // still defines the head.
            warn!(
                dir = %dir.display(),
                files = versions.len(),
                highest,
                "version files are not contiguous"
            );
        }
        debug!(dir = %dir.display(), highest, "versioned store opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            highest: Mutex::new(highest),
        })
    }

    /// Directory holding the version files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, version: u64) -> PathBuf {
        self.dir.join(format!("v{version}{BLOB_SUFFIX}"))
    }
}

fn parse_blob_name(name: &str) -> Option<u64> {
    name.strip_prefix('v')?
        .strip_suffix(BLOB_SUFFIX)?
        .parse()
        .ok()
}

impl VersionedStore for FileVersionedStore {
    fn range(&self) -> RepoResult<RangeSet> {
        let highest = *self.highest.lock();
        if highest == 0 {
            return Ok(RangeSet::new());
        }
        RangeSet::span(1, highest).map_err(|e| RepoError::invalid_state(e.to_string()))
    }

    fn checkout(&self, version: u64) -> RepoResult<Vec<u8>> {
        if version == 0 || version > *self.highest.lock() {
            return Err(RepoError::not_found(version));
        }
        match fs::read(self.blob_path(version)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RepoError::not_found(version))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn commit(&self, data: &[u8], from_version: u64) -> RepoResult<CommitOutcome> {
        let mut highest = self.highest.lock();
        if from_version != *highest {
            return Ok(CommitOutcome::Conflict { current: *highest });
        }

        let version = *highest + 1;
        let path = self.blob_path(version);
        let temp = path.with_extension("blob.tmp");
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &path)?;
        if let Ok(dir) = fs::File::open(&self.dir) {
            let _ = dir.sync_all();
        }

        *highest = version;
        debug!(dir = %self.dir.display(), version, "committed");
        Ok(CommitOutcome::Committed(version))
    }
}

impl std::fmt::Debug for FileVersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileVersionedStore")
            .field("dir", &self.dir)
            .field("highest", &*self.highest.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn empty_store_has_empty_range() {
        let dir = tempdir().unwrap();
        let store = FileVersionedStore::open(dir.path()).unwrap();
        assert!(store.range().unwrap().is_empty());
        assert!(matches!(
            store.checkout(1),
            Err(RepoError::NotFound { version: 1 })
        ));
    }

    #[test]
    fn sequential_commits_are_monotonic() {
        let dir = tempdir().unwrap();
        let store = FileVersionedStore::open(dir.path()).unwrap();

        for n in 1..=5u64 {
            let payload = format!("payload {n}");
            let outcome = store.commit(payload.as_bytes(), n - 1).unwrap();
            assert_eq!(outcome, CommitOutcome::Committed(n));
        }

        assert_eq!(store.range().unwrap().to_representation(), "1-5");
        assert_eq!(store.highest().unwrap(), 5);
        for n in 1..=5u64 {
            assert_eq!(store.checkout(n).unwrap(), format!("payload {n}").into_bytes());
        }
    }

    #[test]
    fn stale_commit_conflicts_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = FileVersionedStore::open(dir.path()).unwrap();
        store.commit(b"v1", 0).unwrap();
        store.commit(b"v2", 1).unwrap();

        let outcome = store.commit(b"stale", 1).unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict { current: 2 });
        assert_eq!(store.highest().unwrap(), 2);
        assert_eq!(store.checkout(2).unwrap(), b"v2");
    }

    #[test]
    fn racing_commits_elect_exactly_one_winner() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FileVersionedStore::open(dir.path()).unwrap());
        store.commit(b"base", 0).unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.commit(format!("racer {i}").as_bytes(), 1).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<CommitOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = outcomes.iter().filter(|o| o.is_committed()).count();
        assert_eq!(winners, 1, "exactly one racer commits");
        assert!(outcomes
            .iter()
            .any(|o| *o == CommitOutcome::Conflict { current: 2 }));
        assert_eq!(store.highest().unwrap(), 2);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileVersionedStore::open(dir.path()).unwrap();
            store.commit(b"one", 0).unwrap();
            store.commit(b"two", 1).unwrap();
        }
        let store = FileVersionedStore::open(dir.path()).unwrap();
        assert_eq!(store.range().unwrap().to_representation(), "1-2");
        assert_eq!(store.checkout(1).unwrap(), b"one");
        assert_eq!(store.checkout(2).unwrap(), b"two");

        // Committing continues from the recovered head.
        assert_eq!(
            store.commit(b"three", 2).unwrap(),
            CommitOutcome::Committed(3)
        );
    }

    #[test]
    fn commit_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = FileVersionedStore::open(dir.path()).unwrap();
        store.commit(b"x", 0).unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn empty_payload_is_a_valid_version() {
        let dir = tempdir().unwrap();
        let store = FileVersionedStore::open(dir.path()).unwrap();
        store.commit(b"", 0).unwrap();
        assert_eq!(store.checkout(1).unwrap(), Vec::<u8>::new());
    }
}
