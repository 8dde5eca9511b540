//! # Convoy storage backends
//!
//! Low-level durable byte storage shared by the event log and the client
//! cache:
//!
//! - [`ByteStore`] — an opaque append-oriented byte store with positional
//!   reads, implemented by [`FileStore`] (durable) and [`MemoryStore`]
//!   (tests, ephemeral use).
//! - [`BlobSlot`] — a named slot holding one byte blob, written atomically,
//!   implemented by [`FileBlob`] and [`MemoryBlob`]. The client cache keeps
//!   its working copy and backup in two slots.
//!
//! Backends are opaque byte containers; record framing and payload formats
//! are owned entirely by the layers above.

mod blob;
mod error;
mod file;
mod memory;
mod store;

pub use blob::{BlobSlot, FileBlob, MemoryBlob};
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::ByteStore;
