//! # Convoy event logs
//!
//! Append-only, crash-resilient audit event storage. Device agents push
//! events which a [`LogStore`] appends to per-`(target, store)` logs;
//! operators and services read them back by `(target, store, range)` using
//! the same [`convoy_range::RangeSet`] vocabulary the repositories use for
//! versions.
//!
//! A log is a sequence of [`EventLogSegment`] files. Segments are append-only
//! while current and immutable once rotated; corruption is repaired by
//! truncating to the last intact record, never by failing the writer.

mod dir;
mod error;
mod event;
mod segment;
mod store;

pub use dir::DirLock;
pub use error::{LogError, LogResult};
pub use event::LogEvent;
pub use segment::{EventLogSegment, RangeScan, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN};
pub use store::{LogDescriptor, LogStore, LogStoreConfig};
