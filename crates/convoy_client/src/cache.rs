//! The durable two-slot repository cache.

use crate::error::{ClientError, ClientResult};
use crate::remote::RemoteStore;
use convoy_storage::{BlobSlot, FileBlob};
use std::path::Path;
use tracing::debug;

/// Sentinel for "no checkout has happened yet".
const NO_VERSION: i64 = -1;

/// A client-side cached repository: a working copy plus a one-level backup,
/// both durable, bound to one remote store.
///
/// Lifecycle: [`checkout`](Self::checkout) fills both slots and records the
/// version; the caller edits the working copy through
/// [`read`](Self::read)/[`write`](Self::write);
/// [`commit`](Self::commit) proposes the working copy as the next version;
/// [`revert`](Self::revert) restores the working copy from the backup
/// without touching the network.
///
/// A `CachedRepository` is one logical session and is deliberately not
/// thread-safe; concurrent sessions each run their own instance against the
/// same remote store and let the server's compare-and-swap arbitrate.
pub struct CachedRepository<R: RemoteStore> {
    remote: R,
    current: Box<dyn BlobSlot>,
    backup: Box<dyn BlobSlot>,
    /// Version the working copy is based on; [`NO_VERSION`] until the first
    /// checkout or commit of this session.
    most_recent_version: i64,
}

impl<R: RemoteStore> CachedRepository<R> {
    /// Creates a cache over explicit slots.
    pub fn new(remote: R, current: Box<dyn BlobSlot>, backup: Box<dyn BlobSlot>) -> Self {
        Self {
            remote,
            current,
            backup,
            most_recent_version: NO_VERSION,
        }
    }

    /// Creates a cache with file-backed slots (`current`, `backup`) in
    /// `dir`.
    pub fn open_dir(remote: R, dir: &Path) -> ClientResult<Self> {
        let current = FileBlob::open(&dir.join("current"))?;
        let backup = FileBlob::open(&dir.join("backup"))?;
        Ok(Self::new(remote, Box::new(current), Box::new(backup)))
    }

    /// The version the working copy is based on, if any checkout or commit
    /// has happened.
    #[must_use]
    pub fn most_recent_version(&self) -> Option<u64> {
        u64::try_from(self.most_recent_version).ok()
    }

    /// Checks out the highest version available remotely.
    ///
    /// With `fail_if_none` set, an empty remote store is an error.
    /// Otherwise an empty remote store yields `Ok(None)` and an empty
    /// working copy based on version 0 — the state from which the store's
    /// first version is committed.
    pub fn checkout(&mut self, fail_if_none: bool) -> ClientResult<Option<u64>> {
        let high = self.remote.range()?.high();
        if high == 0 {
            if fail_if_none {
                return Err(ClientError::NoVersions);
            }
            self.current.write(&[])?;
            self.backup.write(&[])?;
            self.most_recent_version = 0;
            return Ok(None);
        }
        self.checkout_version(high).map(Some)
    }

    /// Checks out a specific version: fetches its bytes, fills the working
    /// copy, snapshots the backup, and records the version.
    ///
    /// A network failure leaves both slots untouched.
    pub fn checkout_version(&mut self, version: u64) -> ClientResult<u64> {
        let data = self.remote.checkout(version)?;
        self.current.write(&data)?;
        self.backup.write(&data)?;
        self.most_recent_version = version as i64;
        debug!(version, bytes = data.len(), "checked out");
        Ok(version)
    }

    /// Proposes the working copy as the next version, based on the version
    /// last checked out or committed.
    ///
    /// On success the working copy becomes the backup and the version
    /// counter advances — the local bytes are taken as authoritative for
    /// the new version, nothing is re-fetched. On a stale base version this
    /// returns `false` and all local state stays put; the caller must
    /// check out the current version before retrying.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::CommitWithoutCheckout`] if nothing was
    /// ever checked out (or the working copy was deleted).
    pub fn commit(&mut self) -> ClientResult<bool> {
        if self.most_recent_version < 0 {
            return Err(ClientError::CommitWithoutCheckout);
        }
        let Some(reader) = self.current.reader()? else {
            return Err(ClientError::CommitWithoutCheckout);
        };

        let committed = self
            .remote
            .commit(reader, self.most_recent_version as u64)?;
        if committed {
            if let Some(data) = self.current.read()? {
                self.backup.write(&data)?;
            }
            self.most_recent_version += 1;
            debug!(version = self.most_recent_version, "committed");
        }
        Ok(committed)
    }

    /// Restores the working copy from the backup. No network traffic.
    ///
    /// # Errors
    ///
    /// Fails with [`ClientError::MissingBackup`] if no checkout ever
    /// created a backup.
    pub fn revert(&mut self) -> ClientResult<()> {
        let Some(data) = self.backup.read()? else {
            return Err(ClientError::MissingBackup);
        };
        self.current.write(&data)?;
        Ok(())
    }

    /// True if the remote store's highest version equals the version this
    /// cache is based on.
    pub fn is_current(&self) -> ClientResult<bool> {
        let high = self.remote.range()?.high();
        Ok(self.most_recent_version >= 0 && high == self.most_recent_version as u64)
    }

    /// Reads the working copy.
    pub fn read(&self) -> ClientResult<Option<Vec<u8>>> {
        Ok(self.current.read()?)
    }

    /// Replaces the working copy (a local edit; the backup keeps the
    /// checked-out bytes until the next checkout or successful commit).
    pub fn write(&mut self, data: &[u8]) -> ClientResult<()> {
        self.current.write(data)?;
        Ok(())
    }

    /// Discards both slots and forgets the version.
    pub fn delete_local(&mut self) -> ClientResult<()> {
        self.current.delete()?;
        self.backup.delete()?;
        self.most_recent_version = NO_VERSION;
        Ok(())
    }

    /// The remote store this cache is bound to.
    pub fn remote(&self) -> &R {
        &self.remote
    }
}

impl<R: RemoteStore> std::fmt::Debug for CachedRepository<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRepository")
            .field("most_recent_version", &self.most_recent_version)
            .finish_non_exhaustive()
    }
}
