//! The versioned-store contract.

use crate::error::RepoResult;
use convoy_range::RangeSet;

/// Outcome of a compare-and-swap commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The commit won: the payload is now this version.
    Committed(u64),
    /// The caller's `from_version` was stale; nothing was written.
    ///
    /// The caller must check out the current version before retrying.
    Conflict {
        /// The store's actual highest version at the time of the attempt.
        current: u64,
    },
}

impl CommitOutcome {
    /// True if the commit was applied.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

/// An authoritative, append-only version history of an opaque byte payload.
///
/// Versions are numbered sequentially from 1 and never deleted
/// individually, so [`VersionedStore::range`] is always a single contiguous
/// interval `1..=highest` (or empty for a store with no versions yet).
///
/// `commit` is the only mutation and must be atomic with respect to
/// concurrent commits on the same store: of two racers carrying the same
/// `from_version`, exactly one observes [`CommitOutcome::Committed`].
pub trait VersionedStore: Send + Sync {
    /// The set of committed version numbers. Cheap; reads no payloads.
    fn range(&self) -> RepoResult<RangeSet>;

    /// Returns the payload of `version`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::RepoError::NotFound`] if `version` is not in
    /// [`VersionedStore::range`].
    fn checkout(&self, version: u64) -> RepoResult<Vec<u8>>;

    /// Proposes `data` as the next version, contingent on `from_version`
    /// still being the highest committed version (0 for an empty store).
    ///
    /// On success the new version is durably persisted before this returns.
    fn commit(&self, data: &[u8], from_version: u64) -> RepoResult<CommitOutcome>;

    /// The highest committed version, 0 when empty.
    fn highest(&self) -> RepoResult<u64> {
        Ok(self.range()?.high())
    }
}
