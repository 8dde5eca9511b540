//! HTTP client abstraction.
//!
//! The protocol client is written against the [`HttpClient`] trait so the
//! actual transport is pluggable: [`ReqwestClient`] for real networks, a
//! [`LoopbackClient`] routing straight into an in-process server for tests,
//! or anything else that can carry a GET and a streaming POST.

use std::io::Read;

/// Status and body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// A blocking HTTP transport.
///
/// Implementations report only transport-level failure as `Err`; any HTTP
/// status, including error statuses, is a successful exchange carried in
/// the [`WireReply`].
pub trait HttpClient: Send + Sync {
    /// Performs a GET.
    fn get(&self, url: &str) -> Result<WireReply, String>;

    /// Performs a POST, streaming `body` (chunked) so memory use stays
    /// independent of payload size.
    fn post(&self, url: &str, body: Box<dyn Read + Send + 'static>) -> Result<WireReply, String>;
}

/// [`HttpClient`] over a blocking `reqwest` client.
#[derive(Debug)]
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Builds a client with default settings.
    ///
    /// # Errors
    ///
    /// Returns the builder's error message if the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { client })
    }

    fn reply(response: reqwest::blocking::Response) -> Result<WireReply, String> {
        let status = response.status().as_u16();
        let body = response.bytes().map_err(|e| e.to_string())?.to_vec();
        Ok(WireReply { status, body })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str) -> Result<WireReply, String> {
        let response = self.client.get(url).send().map_err(|e| e.to_string())?;
        Self::reply(response)
    }

    fn post(&self, url: &str, body: Box<dyn Read + Send + 'static>) -> Result<WireReply, String> {
        let response = self
            .client
            .post(url)
            .body(reqwest::blocking::Body::new(body))
            .send()
            .map_err(|e| e.to_string())?;
        Self::reply(response)
    }
}

/// A server an in-process loopback client can hand requests to.
///
/// The sync server's dispatcher satisfies this shape; test setups implement
/// it with a couple of lines.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request. `method` is `"GET"` or `"POST"`.
    fn handle(&self, method: &str, url: &str, body: &[u8]) -> WireReply;
}

/// An [`HttpClient`] that routes requests directly to a [`LoopbackServer`],
/// skipping the network entirely.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a loopback client over `server`.
    pub fn new(server: S) -> Self {
        Self { server }
    }
}

impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    fn get(&self, url: &str) -> Result<WireReply, String> {
        Ok(self.server.handle("GET", url, &[]))
    }

    fn post(&self, url: &str, mut body: Box<dyn Read + Send + 'static>) -> Result<WireReply, String> {
        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes).map_err(|e| e.to_string())?;
        Ok(self.server.handle("POST", url, &bytes))
    }
}
