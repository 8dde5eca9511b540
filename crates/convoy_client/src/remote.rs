//! Wire client for the versioned-store protocol.

use crate::error::{ClientError, ClientResult};
use crate::http::HttpClient;
use convoy_range::RangeSet;
use std::io::Read;
use std::sync::Arc;

/// One line of a query response: a store and its committed versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreListing {
    /// Owning customer.
    pub customer: String,
    /// Store name.
    pub name: String,
    /// Committed version numbers.
    pub range: RangeSet,
}

/// Client-side view of a remote versioned store.
///
/// Mirrors the server contract: `range` is cheap discovery, `checkout`
/// fetches one version's bytes, and `commit` proposes the next version and
/// reports `false` when the compare-and-swap lost (the caller re-checkouts
/// and retries).
pub trait RemoteStore: Send + Sync {
    /// The remote store's committed version numbers.
    fn range(&self) -> ClientResult<RangeSet>;

    /// Fetches the payload of `version`.
    fn checkout(&self, version: u64) -> ClientResult<Vec<u8>>;

    /// Proposes `data` as the successor of `from_version`. Returns `false`
    /// on a stale `from_version`.
    fn commit(
        &self,
        data: Box<dyn Read + Send + 'static>,
        from_version: u64,
    ) -> ClientResult<bool>;
}

/// The three paths a remote endpoint answers on.
#[derive(Debug, Clone, Copy)]
struct RemotePaths {
    query: &'static str,
    checkout: &'static str,
    commit: &'static str,
}

const REPOSITORY_PATHS: RemotePaths = RemotePaths {
    query: "/repository/query",
    checkout: "/repository/checkout",
    commit: "/repository/commit",
};

const REPLICATION_PATHS: RemotePaths = RemotePaths {
    query: "/replication/query",
    checkout: "/replication/get",
    commit: "/replication/put",
};

/// HTTP implementation of [`RemoteStore`] for one `(customer, name)` store.
///
/// Translates protocol statuses back into the store contract: `404` on
/// checkout means the version is absent, `304` on commit means the caller
/// was stale, `400` means a malformed request, `406` means the store is not
/// a master. Commit payloads are streamed, so memory use is independent of
/// payload size.
pub struct RemoteRepository {
    base_url: String,
    customer: String,
    name: String,
    paths: RemotePaths,
    client: Arc<dyn HttpClient>,
}

impl RemoteRepository {
    /// Creates a client for the repository endpoint.
    pub fn new(
        base_url: impl Into<String>,
        customer: impl Into<String>,
        name: impl Into<String>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            customer: customer.into(),
            name: name.into(),
            paths: REPOSITORY_PATHS,
            client,
        }
    }

    /// Creates a client for the replication endpoint (`/get`, `/put`).
    pub fn replication(
        base_url: impl Into<String>,
        customer: impl Into<String>,
        name: impl Into<String>,
        client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            customer: customer.into(),
            name: name.into(),
            paths: REPLICATION_PATHS,
            client,
        }
    }

    /// The store's identity as `customer/name`.
    #[must_use]
    pub fn identity(&self) -> String {
        format!("{}/{}", self.customer, self.name)
    }

    fn url(&self, path: &str, version: Option<u64>) -> String {
        let mut url = format!(
            "{}{}?customer={}&name={}",
            self.base_url,
            path,
            urlencoding::encode(&self.customer),
            urlencoding::encode(&self.name),
        );
        if let Some(version) = version {
            url.push_str(&format!("&version={version}"));
        }
        url
    }

    /// Queries the endpoint for this store's listing.
    pub fn query(&self) -> ClientResult<Vec<StoreListing>> {
        let url = self.url(self.paths.query, None);
        let reply = self
            .client
            .get(&url)
            .map_err(ClientError::transport_retryable)?;
        if reply.status != 200 {
            return Err(ClientError::UnexpectedStatus {
                operation: "query",
                status: reply.status,
            });
        }
        parse_listing(&reply.body)
    }
}

/// Parses a query response body: one `customer,name,<range>` line per store.
///
/// An unparsable range is surfaced as [`ClientError::Range`], never
/// repaired — it crossed the wire and indicates a broken peer.
pub fn parse_listing(body: &[u8]) -> ClientResult<Vec<StoreListing>> {
    let text = std::str::from_utf8(body)
        .map_err(|_| ClientError::transport_fatal("query response is not UTF-8"))?;
    let mut listings = Vec::new();
    for line in text.lines() {
        let mut fields = line.splitn(3, ',');
        let (Some(customer), Some(name), Some(range)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(ClientError::transport_fatal(format!(
                "malformed query line: `{line}`"
            )));
        };
        listings.push(StoreListing {
            customer: customer.to_string(),
            name: name.to_string(),
            range: range.parse()?,
        });
    }
    Ok(listings)
}

fn trim_base(mut base: String) -> String {
    while base.ends_with('/') {
        base.pop();
    }
    base
}

impl RemoteStore for RemoteRepository {
    fn range(&self) -> ClientResult<RangeSet> {
        let listings = self.query()?;
        Ok(listings
            .into_iter()
            .find(|l| l.customer == self.customer && l.name == self.name)
            .map(|l| l.range)
            .unwrap_or_default())
    }

    fn checkout(&self, version: u64) -> ClientResult<Vec<u8>> {
        let url = self.url(self.paths.checkout, Some(version));
        let reply = self
            .client
            .get(&url)
            .map_err(ClientError::transport_retryable)?;
        match reply.status {
            200 => Ok(reply.body),
            404 => Err(ClientError::NotFound { version }),
            400 => Err(ClientError::InvalidArgument),
            status => Err(ClientError::UnexpectedStatus {
                operation: "checkout",
                status,
            }),
        }
    }

    fn commit(
        &self,
        data: Box<dyn Read + Send + 'static>,
        from_version: u64,
    ) -> ClientResult<bool> {
        let url = self.url(self.paths.commit, Some(from_version));
        let reply = self
            .client
            .post(&url, data)
            .map_err(ClientError::transport_retryable)?;
        match reply.status {
            200 => Ok(true),
            304 => Ok(false),
            400 => Err(ClientError::InvalidArgument),
            406 => Err(ClientError::NotMaster),
            status => Err(ClientError::UnexpectedStatus {
                operation: "commit",
                status,
            }),
        }
    }
}

impl std::fmt::Debug for RemoteRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRepository")
            .field("base_url", &self.base_url)
            .field("customer", &self.customer)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
