//! Log-root directory layout and locking.
//!
//! Layout: `<root>/<encoded target>/<store_id>/<segment_id>.seg`. Target IDs
//! are arbitrary strings, so they are percent-encoded into directory names;
//! store and segment IDs are numeric (creation-timestamp derived,
//! incremented on collision).

use crate::error::{LogError, LogResult};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Name of the advisory lock file at the log root.
const LOCK_FILE: &str = ".lock";

/// Segment file extension.
const SEGMENT_SUFFIX: &str = ".seg";

/// Exclusive advisory lock on a log root directory.
///
/// Held for the lifetime of a [`crate::LogStore`]; a second process opening
/// the same root fails with [`LogError::Locked`] instead of interleaving
/// appends.
#[derive(Debug)]
pub struct DirLock {
    _file: File,
}

impl DirLock {
    /// Creates the root directory if needed and takes the lock.
    pub fn acquire(root: &Path) -> LogResult<Self> {
        fs::create_dir_all(root)?;
        let file = File::create(root.join(LOCK_FILE))?;
        file.try_lock_exclusive().map_err(|_| LogError::Locked)?;
        Ok(Self { _file: file })
    }
}

pub(crate) fn target_dir(root: &Path, target_id: &str) -> PathBuf {
    root.join(urlencoding::encode(target_id).into_owned())
}

pub(crate) fn store_dir(root: &Path, target_id: &str, store_id: u64) -> PathBuf {
    target_dir(root, target_id).join(store_id.to_string())
}

pub(crate) fn segment_path(store_dir: &Path, segment_id: u64) -> PathBuf {
    store_dir.join(format!("{segment_id}{SEGMENT_SUFFIX}"))
}

/// Picks a fresh timestamp-derived numeric name inside `dir`.
///
/// Collisions (several creations within one millisecond, or clock retreat)
/// are resolved by incrementing.
pub(crate) fn unique_numeric_id(dir: &Path, taken: impl Fn(u64) -> bool) -> u64 {
    let mut id = crate::event::now_millis().max(1);
    while taken(id) || dir.join(id.to_string()).exists() {
        id += 1;
    }
    id
}

pub(crate) fn unique_segment_id(store_dir: &Path) -> u64 {
    let mut id = crate::event::now_millis().max(1);
    while segment_path(store_dir, id).exists() {
        id += 1;
    }
    id
}

/// Lists `(target_id, path)` pairs under the root.
pub(crate) fn list_targets(root: &Path) -> LogResult<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(encoded) = name.to_str() else {
            continue;
        };
        match urlencoding::decode(encoded) {
            Ok(target) => out.push((target.into_owned(), entry.path())),
            Err(_) => {
                tracing::warn!(dir = %entry.path().display(), "skipping undecodable target directory");
            }
        }
    }
    out.sort();
    Ok(out)
}

/// Lists `(numeric_id, path)` child directories, ascending.
pub(crate) fn list_stores(target_dir: &Path) -> LogResult<Vec<(u64, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(target_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|s| s.parse().ok()) {
            out.push((id, entry.path()));
        }
    }
    out.sort();
    Ok(out)
}

/// Lists `(segment_id, path)` segment files, ascending by ID.
pub(crate) fn list_segments(store_dir: &Path) -> LogResult<Vec<(u64, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(store_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(SEGMENT_SUFFIX) else {
            continue;
        };
        if let Ok(id) = stem.parse() {
            out.push((id, entry.path()));
        }
    }
    out.sort();
    Ok(out)
}
