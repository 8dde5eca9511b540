//! The per-target, per-store event log.

use crate::dir::{self, DirLock};
use crate::error::{LogError, LogResult};
use crate::event::LogEvent;
use crate::segment::EventLogSegment;
use convoy_range::RangeSet;
use convoy_storage::FileStore;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for a [`LogStore`].
#[derive(Debug, Clone)]
pub struct LogStoreConfig {
    /// Retention cap: `clean` keeps at most this many of the most recent
    /// events per `(target, store)`. `None` disables pruning.
    pub max_events_per_store: Option<u64>,
    /// Rotate the current segment once it holds this many events.
    pub max_events_per_segment: u64,
    /// Fsync the current segment at the end of every `put` batch.
    pub sync_on_put: bool,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            max_events_per_store: None,
            max_events_per_segment: 4096,
            sync_on_put: true,
        }
    }
}

/// Summary of one `(target, store)` log: which event IDs are present.
///
/// Derived by scanning, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogDescriptor {
    /// Target the log belongs to.
    pub target_id: String,
    /// Store within the target.
    pub store_id: u64,
    /// Event IDs present across the store's segments.
    pub ranges: RangeSet,
}

/// Mutable append state, guarded by the store's write mutex.
struct WriteState {
    /// Next event ID to assign; IDs are gap-free per store.
    next_event_id: u64,
    /// Segment receiving appends.
    current: Arc<EventLogSegment>,
}

/// One `(target, store)` log and its segment list.
struct StoreState {
    target_id: String,
    store_id: u64,
    dir: PathBuf,
    /// Published segment list, ascending by event range. Readers clone the
    /// `Arc` and scan the snapshot; rotation and retention publish a fresh
    /// list and never touch a published one.
    segments: RwLock<Arc<Vec<Arc<EventLogSegment>>>>,
    write: Mutex<WriteState>,
}

impl StoreState {
    /// Opens (or creates) the store directory and all its segments,
    /// repairing damaged tails along the way.
    fn open(target_id: String, store_id: u64, dir: PathBuf) -> LogResult<Self> {
        fs::create_dir_all(&dir)?;

        let mut segments = Vec::new();
        for (segment_id, path) in dir::list_segments(&dir)? {
            let file = FileStore::open(&path)?;
            segments.push(Arc::new(EventLogSegment::open(segment_id, Arc::new(file))?));
        }
        if segments.is_empty() {
            let segment_id = dir::unique_segment_id(&dir);
            let file = FileStore::open(&dir::segment_path(&dir, segment_id))?;
            segments.push(Arc::new(EventLogSegment::open(segment_id, Arc::new(file))?));
        }

        let next_event_id = segments.iter().map(|s| s.high()).max().unwrap_or(0) + 1;
        let current = segments
            .last()
            .cloned()
            .ok_or_else(|| LogError::corrupt("store opened with no segments"))?;

        Ok(Self {
            target_id,
            store_id,
            dir,
            segments: RwLock::new(Arc::new(segments)),
            write: Mutex::new(WriteState {
                next_event_id,
                current,
            }),
        })
    }

    fn snapshot(&self) -> Arc<Vec<Arc<EventLogSegment>>> {
        Arc::clone(&self.segments.read())
    }

    fn descriptor(&self) -> LogDescriptor {
        let ranges = self
            .snapshot()
            .iter()
            .fold(RangeSet::new(), |acc, s| acc.union(&s.descriptor()));
        LogDescriptor {
            target_id: self.target_id.clone(),
            store_id: self.store_id,
            ranges,
        }
    }

    /// Appends `segment` to the published list.
    fn publish_push(&self, segment: Arc<EventLogSegment>) {
        let mut list = self.segments.write();
        let mut next = (**list).clone();
        next.push(segment);
        *list = Arc::new(next);
    }

    /// Replaces the published list wholesale.
    fn publish_replace(&self, segments: Vec<Arc<EventLogSegment>>) {
        *self.segments.write() = Arc::new(segments);
    }
}

/// Append-only audit event store, multiplexing `(target, store)` logs over
/// segment files under a single locked root directory.
///
/// Many readers and writers may operate concurrently: appends to one store
/// serialize on that store's mutex, readers scan `Arc` snapshots of the
/// segment list on their own cursors, and segment rotation publishes a new
/// list atomically.
pub struct LogStore {
    root: PathBuf,
    config: LogStoreConfig,
    _lock: DirLock,
    stores: RwLock<HashMap<(String, u64), Arc<StoreState>>>,
}

impl LogStore {
    /// Opens a log store rooted at `root`, taking an exclusive lock and
    /// recovering every `(target, store)` log found on disk.
    ///
    /// # Errors
    ///
    /// Fails with [`LogError::Locked`] if another process holds the root,
    /// or with an I/O error if recovery cannot read the directory tree.
    pub fn open(root: &Path, config: LogStoreConfig) -> LogResult<Self> {
        let lock = DirLock::acquire(root)?;

        let mut stores = HashMap::new();
        for (target_id, target_path) in dir::list_targets(root)? {
            for (store_id, store_path) in dir::list_stores(&target_path)? {
                let state = StoreState::open(target_id.clone(), store_id, store_path)?;
                stores.insert((target_id.clone(), store_id), Arc::new(state));
            }
        }
        debug!(root = %root.display(), stores = stores.len(), "log store opened");

        Ok(Self {
            root: root.to_path_buf(),
            config,
            _lock: lock,
            stores: RwLock::new(stores),
        })
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh store for `target` and returns its ID
    /// (timestamp-derived, disambiguated on collision).
    pub fn create_store(&self, target_id: &str) -> LogResult<u64> {
        if target_id.is_empty() {
            return Err(LogError::invalid_event("empty target ID"));
        }
        let mut stores = self.stores.write();
        let target_path = dir::target_dir(&self.root, target_id);
        fs::create_dir_all(&target_path)?;
        let store_id = dir::unique_numeric_id(&target_path, |id| {
            stores.contains_key(&(target_id.to_string(), id))
        });
        let state = StoreState::open(
            target_id.to_string(),
            store_id,
            target_path.join(store_id.to_string()),
        )?;
        stores.insert((target_id.to_string(), store_id), Arc::new(state));
        Ok(store_id)
    }

    fn lookup(&self, target_id: &str, store_id: u64) -> Option<Arc<StoreState>> {
        self.stores
            .read()
            .get(&(target_id.to_string(), store_id))
            .cloned()
    }

    fn lookup_or_create(&self, target_id: &str, store_id: u64) -> LogResult<Arc<StoreState>> {
        if let Some(state) = self.lookup(target_id, store_id) {
            return Ok(state);
        }
        let mut stores = self.stores.write();
        let key = (target_id.to_string(), store_id);
        if let Some(state) = stores.get(&key) {
            return Ok(Arc::clone(state));
        }
        let state = Arc::new(StoreState::open(
            target_id.to_string(),
            store_id,
            dir::store_dir(&self.root, target_id, store_id),
        )?);
        stores.insert(key, Arc::clone(&state));
        Ok(state)
    }

    /// Persists `events`, assigning each the next sequential event ID of its
    /// `(target, store)` pair. Returns the events with IDs filled in.
    ///
    /// IDs are strictly sequential with no gaps, so a store's descriptor
    /// stays a single contiguous interval and readers can detect missing
    /// ranges cheaply. A corrupted current segment triggers rollover to a
    /// brand-new segment: the loss is confined to the broken file and the
    /// put still succeeds.
    pub fn put(&self, events: Vec<LogEvent>) -> LogResult<Vec<LogEvent>> {
        let mut assigned: Vec<Option<LogEvent>> = (0..events.len()).map(|_| None).collect();

        // Group by (target, store) so each store locks and syncs once.
        let mut groups: HashMap<(String, u64), Vec<(usize, LogEvent)>> = HashMap::new();
        for (index, event) in events.into_iter().enumerate() {
            if event.target_id.is_empty() {
                return Err(LogError::invalid_event("empty target ID"));
            }
            if event.store_id == 0 {
                return Err(LogError::invalid_event("store ID must be non-zero"));
            }
            groups
                .entry((event.target_id.clone(), event.store_id))
                .or_default()
                .push((index, event));
        }

        for ((target_id, store_id), batch) in groups {
            let state = self.lookup_or_create(&target_id, store_id)?;
            let mut ws = state.write.lock();
            for (index, mut event) in batch {
                event.event_id = ws.next_event_id;
                let payload = event.encode()?;
                self.append_locked(&state, &mut ws, event.event_id, &payload)?;
                ws.next_event_id += 1;
                assigned[index] = Some(event);
            }
            if self.config.sync_on_put {
                ws.current.sync()?;
            }
        }

        Ok(assigned.into_iter().flatten().collect())
    }

    /// One append under the store's write lock, with size-based rotation
    /// and corruption rollover.
    fn append_locked(
        &self,
        state: &StoreState,
        ws: &mut MutexGuard<'_, WriteState>,
        event_id: u64,
        payload: &[u8],
    ) -> LogResult<()> {
        if ws.current.event_count() >= self.config.max_events_per_segment {
            // Seal the full segment durably before moving on.
            if self.config.sync_on_put {
                ws.current.sync()?;
            }
            ws.current = self.rotate(state)?;
        }
        match ws.current.append(event_id, payload) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    target_id = %state.target_id,
                    store = state.store_id,
                    segment = ws.current.segment_id(),
                    %e,
                    "append failed, rolling over to a new segment"
                );
                // Keep what the broken segment still holds, then leave it
                // behind. Loss is confined to its unreadable tail.
                if let Err(repair_err) = ws.current.repair() {
                    warn!(%repair_err, "could not repair segment before rollover");
                }
                ws.current = self.rotate(state)?;
                ws.current.append(event_id, payload)?;
                Ok(())
            }
        }
    }

    /// Creates a fresh segment and publishes it as the new tail of the list.
    fn rotate(&self, state: &StoreState) -> LogResult<Arc<EventLogSegment>> {
        let segment_id = dir::unique_segment_id(&state.dir);
        let file = FileStore::open_with_create_dirs(&dir::segment_path(&state.dir, segment_id))?;
        let segment = Arc::new(EventLogSegment::open(segment_id, Arc::new(file))?);
        state.publish_push(Arc::clone(&segment));
        debug!(
            target_id = %state.target_id,
            store = state.store_id,
            segment = segment_id,
            "rotated to new segment"
        );
        Ok(segment)
    }

    /// Reads events with IDs in `[from, to]` for one `(target, store)` log,
    /// ascending.
    ///
    /// Best-effort complete: corruption encountered mid-serve yields the
    /// successfully scanned events and a warning, never an error. An unknown
    /// store yields no events.
    pub fn get(&self, target_id: &str, store_id: u64, from: u64, to: u64) -> Vec<LogEvent> {
        let Some(state) = self.lookup(target_id, store_id) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for segment in state.snapshot().iter() {
            let descriptor = segment.descriptor();
            if descriptor.is_empty() || descriptor.low() > to || descriptor.high() < from {
                continue;
            }
            match segment.read_range(from, to) {
                Ok(scan) => {
                    if !scan.complete {
                        warn!(
                            target_id,
                            store = store_id,
                            segment = segment.segment_id(),
                            "segment scan ended early, returning partial results"
                        );
                    }
                    for (event_id, payload) in scan.records {
                        match LogEvent::decode(&payload) {
                            Ok(event) => {
                                debug_assert_eq!(event.event_id, event_id);
                                events.push(event);
                            }
                            Err(e) => {
                                warn!(
                                    target_id,
                                    store = store_id,
                                    event = event_id,
                                    %e,
                                    "skipping undecodable event"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        target_id,
                        store = store_id,
                        segment = segment.segment_id(),
                        %e,
                        "segment unreadable, skipping"
                    );
                }
            }
        }

        events.sort_by_key(|e| e.event_id);
        events
    }

    /// Lists one descriptor per `(target, store)` log currently on disk,
    /// optionally restricted to one target. Sorted by target, then store.
    pub fn descriptors(&self, target_id: Option<&str>) -> Vec<LogDescriptor> {
        let stores = self.stores.read();
        let mut out: Vec<LogDescriptor> = stores
            .values()
            .filter(|s| target_id.is_none_or(|t| s.target_id == t))
            .map(|s| s.descriptor())
            .collect();
        out.sort_by(|a, b| {
            (a.target_id.as_str(), a.store_id).cmp(&(b.target_id.as_str(), b.store_id))
        });
        out
    }

    /// Enforces the retention cap on every store: keeps at most the
    /// configured number of most-recent events, deleting whole obsolete
    /// segments and rewriting the one segment straddling the cutoff.
    ///
    /// Readers holding a snapshot of the previous segment list are never
    /// disturbed; their file handles stay valid until the snapshot drops.
    pub fn clean(&self) -> LogResult<()> {
        let Some(max) = self.config.max_events_per_store else {
            return Ok(());
        };
        let states: Vec<Arc<StoreState>> = self.stores.read().values().cloned().collect();

        for state in states {
            let mut ws = state.write.lock();
            let snapshot = state.snapshot();
            let total: u64 = snapshot.iter().map(|s| s.event_count()).sum();
            if total <= max {
                continue;
            }
            let high = snapshot.iter().map(|s| s.high()).max().unwrap_or(0);
            let cutoff = high.saturating_sub(max); // retain IDs > cutoff

            let mut kept: Vec<Arc<EventLogSegment>> = Vec::new();
            let mut obsolete: Vec<u64> = Vec::new();
            for (position, segment) in snapshot.iter().enumerate() {
                let is_last = position + 1 == snapshot.len();
                if segment.high() <= cutoff && !is_last {
                    obsolete.push(segment.segment_id());
                } else if segment.low() > cutoff || segment.descriptor().is_empty() {
                    kept.push(Arc::clone(segment));
                } else {
                    kept.push(self.rewrite_tail(&state, segment, cutoff)?);
                }
            }

            debug!(
                target_id = %state.target_id,
                store = state.store_id,
                dropped_segments = obsolete.len(),
                retained = max.min(total),
                "retention clean"
            );
            state.publish_replace(kept);
            if let Some(last) = state.snapshot().last() {
                ws.current = Arc::clone(last);
            }

            for segment_id in obsolete {
                let path = dir::segment_path(&state.dir, segment_id);
                if let Err(e) = fs::remove_file(&path) {
                    warn!(path = %path.display(), %e, "could not remove obsolete segment");
                }
            }
        }
        Ok(())
    }

    /// Rewrites the events of `segment` with IDs above `cutoff` into a fresh
    /// file, then atomically renames it over the segment's path. The old
    /// descriptor object (and any reader snapshots holding it) keep the old
    /// file contents via their open handle.
    fn rewrite_tail(
        &self,
        state: &StoreState,
        segment: &EventLogSegment,
        cutoff: u64,
    ) -> LogResult<Arc<EventLogSegment>> {
        let segment_id = segment.segment_id();
        let path = dir::segment_path(&state.dir, segment_id);
        let temp = path.with_extension("seg.tmp");
        if temp.exists() {
            fs::remove_file(&temp)?;
        }

        let scan = segment.read_range(cutoff + 1, u64::MAX)?;
        let file = FileStore::open(&temp)?;
        let rebuilt = EventLogSegment::open(segment_id, Arc::new(file))?;
        for (event_id, payload) in scan.records {
            rebuilt.append(event_id, &payload)?;
        }
        rebuilt.sync()?;
        fs::rename(&temp, &path)?;
        Ok(Arc::new(rebuilt))
    }
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("root", &self.root)
            .field("stores", &self.stores.read().len())
            .finish_non_exhaustive()
    }
}
