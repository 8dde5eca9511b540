//! Protocol dispatch for the three sync commands.

use crate::request::{WireMethod, WireRequest, WireResponse};
use convoy_repo::{CommitOutcome, RepoError, Selection, StoreRegistry};
use std::sync::Arc;
use tracing::{debug, warn};

/// The paths and policy one endpoint variant answers on.
///
/// The repository and replication variants of the protocol are the same
/// three operations under different paths; a routes value captures the
/// difference so a single [`SyncEndpoint`] serves either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointRoutes {
    /// Path of the query (discovery) command.
    pub query: &'static str,
    /// Path of the checkout (read) command.
    pub checkout: &'static str,
    /// Path of the commit (write) command.
    pub commit: &'static str,
    /// Whether commits are refused on non-master stores.
    pub require_master: bool,
}

/// Routes of the repository endpoint used by device caches.
pub const REPOSITORY_ROUTES: EndpointRoutes = EndpointRoutes {
    query: "/repository/query",
    checkout: "/repository/checkout",
    commit: "/repository/commit",
    require_master: true,
};

/// Routes of the replication endpoint used between servers. Replicas accept
/// `put`, so the master flag is not enforced.
pub const REPLICATION_ROUTES: EndpointRoutes = EndpointRoutes {
    query: "/replication/query",
    checkout: "/replication/get",
    commit: "/replication/put",
    require_master: false,
};

/// One protocol endpoint bound to a store registry.
///
/// Status mapping: `200` success, `304` stale commit, `400` malformed
/// version, `404` store/version absent (or an ambiguous `(customer, name)`
/// match, which is a server misconfiguration), `406` commit to a non-master
/// store, `500` internal I/O failure.
pub struct SyncEndpoint {
    registry: Arc<StoreRegistry>,
    routes: EndpointRoutes,
}

impl SyncEndpoint {
    /// Creates an endpoint serving `registry` on `routes`.
    pub fn new(registry: Arc<StoreRegistry>, routes: EndpointRoutes) -> Self {
        Self { registry, routes }
    }

    /// The routes this endpoint answers on.
    #[must_use]
    pub fn routes(&self) -> &EndpointRoutes {
        &self.routes
    }

    /// True if `path` belongs to this endpoint.
    #[must_use]
    pub fn handles(&self, path: &str) -> bool {
        path == self.routes.query || path == self.routes.checkout || path == self.routes.commit
    }

    /// Dispatches one request.
    pub fn handle(&self, request: &WireRequest) -> WireResponse {
        match (request.method, request.path.as_str()) {
            (WireMethod::Get, p) if p == self.routes.query => self.handle_query(request),
            (WireMethod::Get, p) if p == self.routes.checkout => self.handle_checkout(request),
            (WireMethod::Post, p) if p == self.routes.commit => self.handle_commit(request),
            _ => WireResponse::status(404),
        }
    }

    /// `GET query?[customer=][name=][filter=master]` — one line per match:
    /// `customer,name,<range>\n`. No match is an empty body, not an error.
    fn handle_query(&self, request: &WireRequest) -> WireResponse {
        let master_only = request.param("filter") == Some("master");
        let entries = self
            .registry
            .select(request.param("customer"), request.param("name"), master_only);

        let mut body = String::new();
        for entry in entries {
            match entry.store.range() {
                Ok(range) => {
                    body.push_str(&entry.customer);
                    body.push(',');
                    body.push_str(&entry.name);
                    body.push(',');
                    body.push_str(&range.to_representation());
                    body.push('\n');
                }
                Err(e) => {
                    warn!(customer = %entry.customer, name = %entry.name, %e, "range failed");
                    return WireResponse::status(500);
                }
            }
        }
        WireResponse::ok(body.into_bytes())
    }

    /// `GET checkout?customer=&name=&version=N` — binary payload or `404`.
    fn handle_checkout(&self, request: &WireRequest) -> WireResponse {
        let Some(version) = parse_version(request) else {
            return WireResponse::status(400);
        };
        let entry = match self.resolve(request) {
            Ok(entry) => entry,
            Err(response) => return response,
        };

        match entry.store.checkout(version) {
            Ok(data) => WireResponse::ok(data),
            Err(RepoError::NotFound { .. }) => WireResponse::status(404),
            Err(e) => {
                warn!(customer = %entry.customer, name = %entry.name, version, %e, "checkout failed");
                WireResponse::status(500)
            }
        }
    }

    /// `POST commit?customer=&name=&version=N` with the payload as body.
    fn handle_commit(&self, request: &WireRequest) -> WireResponse {
        let Some(from_version) = parse_version(request) else {
            return WireResponse::status(400);
        };
        let entry = match self.resolve(request) {
            Ok(entry) => entry,
            Err(response) => return response,
        };
        if self.routes.require_master && !entry.master {
            return WireResponse::status(406);
        }

        match entry.store.commit(&request.body, from_version) {
            Ok(CommitOutcome::Committed(version)) => {
                debug!(customer = %entry.customer, name = %entry.name, version, "committed");
                WireResponse::status(200)
            }
            // Losing the race is expected; the caller re-checkouts and
            // retries.
            Ok(CommitOutcome::Conflict { .. }) => WireResponse::status(304),
            Err(e) => {
                warn!(customer = %entry.customer, name = %entry.name, %e, "commit failed");
                WireResponse::status(500)
            }
        }
    }

    /// Resolves the `(customer, name)` filter to exactly one store.
    fn resolve(
        &self,
        request: &WireRequest,
    ) -> Result<Arc<convoy_repo::StoreEntry>, WireResponse> {
        match self
            .registry
            .select_one(request.param("customer"), request.param("name"), false)
        {
            Selection::One(entry) => Ok(entry),
            Selection::None => Err(WireResponse::status(404)),
            Selection::Ambiguous => {
                warn!(
                    customer = request.param("customer").unwrap_or(""),
                    name = request.param("name").unwrap_or(""),
                    "filter matches more than one store"
                );
                Err(WireResponse::status(404))
            }
        }
    }
}

fn parse_version(request: &WireRequest) -> Option<u64> {
    request.param("version")?.parse().ok()
}

impl std::fmt::Debug for SyncEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEndpoint")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// A set of endpoints sharing one listener; requests are routed to the
/// endpoint owning the path.
#[derive(Debug)]
pub struct SyncDispatcher {
    endpoints: Vec<SyncEndpoint>,
}

impl SyncDispatcher {
    /// Creates a dispatcher over `endpoints`.
    #[must_use]
    pub fn new(endpoints: Vec<SyncEndpoint>) -> Self {
        Self { endpoints }
    }

    /// The standard pairing: repository + replication endpoints over one
    /// registry.
    #[must_use]
    pub fn standard(registry: Arc<StoreRegistry>) -> Self {
        Self::new(vec![
            SyncEndpoint::new(Arc::clone(&registry), REPOSITORY_ROUTES),
            SyncEndpoint::new(registry, REPLICATION_ROUTES),
        ])
    }

    /// Routes one request to the owning endpoint; unknown paths are `404`.
    pub fn handle(&self, request: &WireRequest) -> WireResponse {
        match self.endpoints.iter().find(|e| e.handles(&request.path)) {
            Some(endpoint) => endpoint.handle(request),
            None => WireResponse::status(404),
        }
    }
}
