//! # Convoy sync server
//!
//! The wire-protocol surface of the authoritative store: three commands —
//! query, checkout, commit — dispatched over HTTP to the matching
//! [`convoy_repo::VersionedStore`]. The protocol logic lives in
//! [`SyncEndpoint`], which speaks a minimal transport-neutral
//! request/response contract; [`serve`] mounts a set of endpoints on an
//! axum/tokio listener.
//!
//! Two path variants share one implementation: the repository endpoint
//! (`/repository/checkout`, `/repository/commit`, master required for
//! commits) and the replication endpoint (`/replication/get`,
//! `/replication/put`, replicas accepted), differing only in their
//! [`EndpointRoutes`].

mod config;
mod endpoint;
mod request;
mod serve;

pub use config::ServerConfig;
pub use endpoint::{
    EndpointRoutes, SyncDispatcher, SyncEndpoint, REPLICATION_ROUTES, REPOSITORY_ROUTES,
};
pub use request::{WireMethod, WireRequest, WireResponse};
pub use serve::{router, serve};
