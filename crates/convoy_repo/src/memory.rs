//! In-memory versioned store for tests.

use crate::error::{RepoError, RepoResult};
use crate::store::{CommitOutcome, VersionedStore};
use convoy_range::RangeSet;
use parking_lot::Mutex;

/// An in-memory [`VersionedStore`].
///
/// Version N lives at index N-1. Nothing survives the process; intended for
/// tests and wiring experiments.
#[derive(Debug, Default)]
pub struct MemoryVersionedStore {
    versions: Mutex<Vec<Vec<u8>>>,
}

impl MemoryVersionedStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VersionedStore for MemoryVersionedStore {
    fn range(&self) -> RepoResult<RangeSet> {
        let versions = self.versions.lock();
        if versions.is_empty() {
            return Ok(RangeSet::new());
        }
        RangeSet::span(1, versions.len() as u64)
            .map_err(|e| RepoError::invalid_state(e.to_string()))
    }

    fn checkout(&self, version: u64) -> RepoResult<Vec<u8>> {
        let versions = self.versions.lock();
        if version == 0 || version > versions.len() as u64 {
            return Err(RepoError::not_found(version));
        }
        Ok(versions[(version - 1) as usize].clone())
    }

    fn commit(&self, data: &[u8], from_version: u64) -> RepoResult<CommitOutcome> {
        let mut versions = self.versions.lock();
        let current = versions.len() as u64;
        if from_version != current {
            return Ok(CommitOutcome::Conflict { current });
        }
        versions.push(data.to_vec());
        Ok(CommitOutcome::Committed(current + 1))
    }
}
