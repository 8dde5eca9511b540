//! A single append-only event log segment.
//!
//! A segment is one physical file of frames:
//!
//! ```text
//! event_id (8 bytes LE) | payload length (4 bytes LE) | payload
//! ```
//!
//! Event IDs increase strictly within a segment. The tail of the file may be
//! torn by a crash or be a write still in flight; scans treat an incomplete
//! trailing frame as "not yet visible" and the writer repairs the file by
//! truncating to the last intact frame boundary, sacrificing only the
//! unreadable tail.

use crate::error::{LogError, LogResult};
use convoy_range::RangeSet;
use convoy_storage::ByteStore;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Frame header size: event ID (8) + payload length (4).
pub const FRAME_HEADER_LEN: usize = 12;

/// Upper bound on a single event payload.
///
/// A length field above this is treated as corruption, not as a frame.
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Result of a forward range scan.
#[derive(Debug)]
pub struct RangeScan {
    /// `(event_id, payload)` pairs found inside the requested range.
    pub records: Vec<(u64, Vec<u8>)>,
    /// False when the scan stopped at damaged framing before the end of the
    /// segment. A torn trailing frame does not clear this flag.
    pub complete: bool,
}

/// One append-only segment file.
///
/// A segment serializes nothing itself: the owning store serializes appends,
/// while readers scan with their own offsets against positional reads and
/// never block the writer.
pub struct EventLogSegment {
    id: u64,
    store: Arc<dyn ByteStore>,
    ranges: RwLock<RangeSet>,
    count: AtomicU64,
}

impl EventLogSegment {
    /// Opens a segment over `store`, repairing a damaged tail.
    ///
    /// Any bytes after the last intact frame are truncated away; the loss is
    /// logged, never propagated.
    pub fn open(id: u64, store: Arc<dyn ByteStore>) -> LogResult<Self> {
        let segment = Self {
            id,
            store,
            ranges: RwLock::new(RangeSet::new()),
            count: AtomicU64::new(0),
        };
        segment.repair()?;
        Ok(segment)
    }

    /// Numeric segment ID (creation-timestamp derived).
    #[must_use]
    pub fn segment_id(&self) -> u64 {
        self.id
    }

    /// Number of events in the segment.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// The set of event IDs present.
    #[must_use]
    pub fn descriptor(&self) -> RangeSet {
        self.ranges.read().clone()
    }

    /// Highest event ID present, 0 when empty.
    #[must_use]
    pub fn high(&self) -> u64 {
        self.ranges.read().high()
    }

    /// Lowest event ID present, 0 when empty.
    #[must_use]
    pub fn low(&self) -> u64 {
        self.ranges.read().low()
    }

    /// Appends one event frame.
    ///
    /// The caller (the log store) is responsible for assigning IDs;
    /// `event_id` must be strictly greater than every ID already present.
    ///
    /// # Errors
    ///
    /// Fails with [`LogError::EventIdOrder`] on a non-increasing ID,
    /// [`LogError::EventTooLarge`] on an oversized payload, or a storage
    /// error if the write fails.
    pub fn append(&self, event_id: u64, payload: &[u8]) -> LogResult<()> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(LogError::EventTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        let last = self.high();
        if event_id <= last {
            return Err(LogError::EventIdOrder {
                last,
                attempted: event_id,
            });
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.extend_from_slice(&event_id.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(payload);
        self.store.append(&frame)?;

        let mut ranges = self.ranges.write();
        let extended = ranges.union(&RangeSet::single(event_id));
        *ranges = extended;
        self.count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Forces appended frames to durable storage.
    pub fn sync(&self) -> LogResult<()> {
        self.store.sync()?;
        Ok(())
    }

    /// Scans forward and yields frames whose ID falls in `[from, to]`.
    ///
    /// Frames outside the range are skipped without reading their payloads.
    /// The scan stops early once IDs pass `to`. Damaged framing ends the
    /// scan with `complete = false` and whatever was gathered so far; a torn
    /// trailing frame simply ends the scan.
    pub fn read_range(&self, from: u64, to: u64) -> LogResult<RangeScan> {
        let size = self.store.len()?;
        let mut records = Vec::new();
        let mut offset = 0u64;
        let mut last_id = 0u64;

        while offset + FRAME_HEADER_LEN as u64 <= size {
            let header = match self.store.read_at(offset, FRAME_HEADER_LEN) {
                Ok(h) => h,
                Err(e) => {
                    warn!(segment = self.id, %e, "read failed mid-scan");
                    return Ok(RangeScan {
                        records,
                        complete: false,
                    });
                }
            };
            let (event_id, len) = decode_header(&header);

            if len > MAX_PAYLOAD_LEN || event_id <= last_id {
                return Ok(RangeScan {
                    records,
                    complete: false,
                });
            }
            let end = offset + (FRAME_HEADER_LEN + len) as u64;
            if end > size {
                // In-flight or torn write: not yet visible.
                break;
            }

            if event_id > to {
                break;
            }
            if event_id >= from {
                match self.store.read_at(offset + FRAME_HEADER_LEN as u64, len) {
                    Ok(payload) => records.push((event_id, payload)),
                    Err(e) => {
                        warn!(segment = self.id, %e, "payload read failed mid-scan");
                        return Ok(RangeScan {
                            records,
                            complete: false,
                        });
                    }
                }
            }

            last_id = event_id;
            offset = end;
        }

        Ok(RangeScan {
            records,
            complete: true,
        })
    }

    /// Re-scans the file, truncates anything after the last intact frame,
    /// and rebuilds the in-memory descriptor. Returns the repaired length.
    ///
    /// Called on open and by the store after a failed append.
    pub fn repair(&self) -> LogResult<u64> {
        let size = self.store.len()?;
        let mut offset = 0u64;
        let mut last_id = 0u64;
        let mut ids = Vec::new();

        while offset + FRAME_HEADER_LEN as u64 <= size {
            let header = self.store.read_at(offset, FRAME_HEADER_LEN)?;
            let (event_id, len) = decode_header(&header);
            if len > MAX_PAYLOAD_LEN || event_id <= last_id {
                break;
            }
            let end = offset + (FRAME_HEADER_LEN + len) as u64;
            if end > size {
                break;
            }
            ids.push(event_id);
            last_id = event_id;
            offset = end;
        }

        if offset < size {
            warn!(
                segment = self.id,
                dropped = size - offset,
                "truncating damaged segment tail"
            );
            self.store.truncate(offset)?;
        }

        self.count.store(ids.len() as u64, Ordering::Release);
        *self.ranges.write() = ids.into_iter().collect();
        Ok(offset)
    }
}

impl std::fmt::Debug for EventLogSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogSegment")
            .field("id", &self.id)
            .field("events", &self.event_count())
            .finish_non_exhaustive()
    }
}

fn decode_header(header: &[u8]) -> (u64, usize) {
    let event_id = u64::from_le_bytes(header[0..8].try_into().unwrap_or_default());
    let len = u32::from_le_bytes(header[8..12].try_into().unwrap_or_default()) as usize;
    (event_id, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_storage::MemoryStore;

    fn frame(event_id: u64, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&event_id.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    fn segment_with(frames: &[(u64, &[u8])]) -> EventLogSegment {
        let mut data = Vec::new();
        for (id, payload) in frames {
            data.extend_from_slice(&frame(*id, payload));
        }
        EventLogSegment::open(1, Arc::new(MemoryStore::with_data(data))).unwrap()
    }

    #[test]
    fn append_and_read_back() {
        let segment =
            EventLogSegment::open(7, Arc::new(MemoryStore::new())).unwrap();
        segment.append(1, b"one").unwrap();
        segment.append(2, b"two").unwrap();
        segment.append(5, b"five").unwrap();

        let scan = segment.read_range(1, 10).unwrap();
        assert!(scan.complete);
        assert_eq!(
            scan.records,
            vec![
                (1, b"one".to_vec()),
                (2, b"two".to_vec()),
                (5, b"five".to_vec())
            ]
        );
        assert_eq!(segment.event_count(), 3);
        assert_eq!(segment.descriptor().to_representation(), "1-2,5-5");
    }

    #[test]
    fn range_filtering_and_early_exit() {
        let segment = segment_with(&[(1, b"a"), (2, b"b"), (3, b"c"), (4, b"d")]);
        let scan = segment.read_range(2, 3).unwrap();
        assert!(scan.complete);
        assert_eq!(scan.records, vec![(2, b"b".to_vec()), (3, b"c".to_vec())]);
    }

    #[test]
    fn rejects_non_increasing_ids() {
        let segment = segment_with(&[(5, b"x")]);
        assert!(matches!(
            segment.append(5, b"dup"),
            Err(LogError::EventIdOrder { last: 5, attempted: 5 })
        ));
        assert!(matches!(
            segment.append(3, b"old"),
            Err(LogError::EventIdOrder { .. })
        ));
        segment.append(6, b"ok").unwrap();
    }

    #[test]
    fn rejects_oversized_payload() {
        let segment =
            EventLogSegment::open(1, Arc::new(MemoryStore::new())).unwrap();
        let huge = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            segment.append(1, &huge),
            Err(LogError::EventTooLarge { .. })
        ));
    }

    #[test]
    fn open_truncates_torn_tail() {
        let mut data = frame(1, b"intact");
        let torn = frame(2, b"torn payload");
        data.extend_from_slice(&torn[..torn.len() - 4]);

        let store = Arc::new(MemoryStore::with_data(data));
        let segment = EventLogSegment::open(1, Arc::clone(&store) as Arc<dyn ByteStore>).unwrap();

        assert_eq!(segment.event_count(), 1);
        assert_eq!(
            store.len().unwrap(),
            (FRAME_HEADER_LEN + b"intact".len()) as u64
        );

        // The repaired segment accepts new appends and keeps old data.
        segment.append(2, b"retry").unwrap();
        let scan = segment.read_range(1, 10).unwrap();
        assert_eq!(
            scan.records,
            vec![(1, b"intact".to_vec()), (2, b"retry".to_vec())]
        );
    }

    #[test]
    fn open_truncates_torn_header() {
        let mut data = frame(1, b"intact");
        data.extend_from_slice(&[9, 0, 0]); // 3 bytes of a 12-byte header
        let store = Arc::new(MemoryStore::with_data(data));
        let segment = EventLogSegment::open(1, store).unwrap();
        assert_eq!(segment.event_count(), 1);
    }

    #[test]
    fn scan_stops_at_garbage_mid_file() {
        // A frame with an absurd length followed by a valid frame: the valid
        // frame is unreachable and the scan must report incompleteness.
        let mut data = frame(1, b"ok");
        data.extend_from_slice(&2u64.to_le_bytes());
        data.extend_from_slice(&u32::MAX.to_le_bytes());
        data.extend_from_slice(&frame(3, b"unreachable"));

        let store = Arc::new(MemoryStore::with_data(data.clone()));
        // Bypass open() repair to exercise the reader path on a live file.
        let segment = EventLogSegment {
            id: 1,
            store,
            ranges: RwLock::new(RangeSet::single(1)),
            count: AtomicU64::new(1),
        };
        let scan = segment.read_range(1, 10).unwrap();
        assert!(!scan.complete);
        assert_eq!(scan.records, vec![(1, b"ok".to_vec())]);
    }

    #[test]
    fn repair_drops_garbage_and_everything_after() {
        let mut data = frame(1, b"ok");
        let good_len = data.len() as u64;
        data.extend_from_slice(&frame(1, b"out-of-order"));
        data.extend_from_slice(&frame(9, b"after"));

        let store = Arc::new(MemoryStore::with_data(data));
        let segment = EventLogSegment::open(1, Arc::clone(&store) as Arc<dyn ByteStore>).unwrap();
        assert_eq!(store.len().unwrap(), good_len);
        assert_eq!(segment.descriptor().to_representation(), "1-1");
    }

    #[test]
    fn empty_segment() {
        let segment =
            EventLogSegment::open(1, Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(segment.event_count(), 0);
        assert_eq!(segment.high(), 0);
        assert!(segment.descriptor().is_empty());
        let scan = segment.read_range(1, 100).unwrap();
        assert!(scan.complete);
        assert!(scan.records.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Cutting any number of bytes off a segment's tail never
            /// produces an invalid record: open() recovers an intact prefix
            /// with the original IDs and payloads.
            #[test]
            fn arbitrary_truncation_recovers_a_clean_prefix(
                payload_sizes in proptest::collection::vec(0usize..48, 1..8),
                cut in 0usize..96,
            ) {
                let mut data = Vec::new();
                for (i, size) in payload_sizes.iter().enumerate() {
                    let id = i as u64 + 1;
                    data.extend_from_slice(&frame(id, &vec![id as u8; *size]));
                }
                let cut_pos = data.len().saturating_sub(cut);
                let store = Arc::new(MemoryStore::with_data(data[..cut_pos].to_vec()));
                let segment = EventLogSegment::open(1, store).unwrap();

                let scan = segment.read_range(1, u64::MAX).unwrap();
                prop_assert!(scan.complete);
                prop_assert!(scan.records.len() <= payload_sizes.len());
                for (i, (id, payload)) in scan.records.iter().enumerate() {
                    prop_assert_eq!(*id, i as u64 + 1);
                    prop_assert_eq!(payload.len(), payload_sizes[i]);
                    prop_assert!(payload.iter().all(|b| *b == *id as u8));
                }
            }
        }
    }

    #[test]
    fn reader_ignores_in_flight_tail() {
        // A complete frame plus the header of a frame whose payload has not
        // landed yet: the reader must treat the tail as invisible, and the
        // scan is still "complete" (nothing is damaged).
        let mut data = frame(1, b"done");
        data.extend_from_slice(&2u64.to_le_bytes());
        data.extend_from_slice(&100u32.to_le_bytes());

        let store = Arc::new(MemoryStore::with_data(data));
        let segment = EventLogSegment {
            id: 1,
            store,
            ranges: RwLock::new(RangeSet::single(1)),
            count: AtomicU64::new(1),
        };
        let scan = segment.read_range(1, 10).unwrap();
        assert!(scan.complete);
        assert_eq!(scan.records, vec![(1, b"done".to_vec())]);
    }
}
