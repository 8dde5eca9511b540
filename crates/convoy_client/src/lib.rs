//! # Convoy client
//!
//! The cache side of repository synchronization. A device or operator
//! session owns a [`CachedRepository`]: a durable two-slot local cache
//! (working copy + one-level backup) orchestrated over a
//! [`RemoteStore`] — usually a [`RemoteRepository`] speaking the Convoy
//! HTTP protocol through a pluggable [`HttpClient`].
//!
//! The flow is checkout → edit locally → commit. A commit carries the
//! version the edits were based on; if the server has moved on, the commit
//! reports stale and the caller checks out again before retrying —
//! first committer wins, nothing merges.

mod cache;
mod error;
mod http;
mod remote;

pub use cache::CachedRepository;
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, LoopbackClient, LoopbackServer, ReqwestClient, WireReply};
pub use remote::{parse_listing, RemoteRepository, RemoteStore, StoreListing};
