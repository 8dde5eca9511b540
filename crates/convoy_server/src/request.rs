//! Minimal HTTP request/response contract.
//!
//! The endpoint logic is transport-neutral: it consumes a [`WireRequest`]
//! and produces a [`WireResponse`]. The axum front end converts real HTTP
//! traffic into this shape, and the client crate's loopback transport feeds
//! it directly in tests.

use std::collections::HashMap;

/// The two methods the protocol uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireMethod {
    /// Query and checkout.
    Get,
    /// Commit.
    Post,
}

/// One request as seen by an endpoint.
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// Request method.
    pub method: WireMethod,
    /// Path component, without the query string.
    pub path: String,
    /// Decoded query parameters.
    pub query: HashMap<String, String>,
    /// Raw request body (commit payload).
    pub body: Vec<u8>,
}

impl WireRequest {
    /// Builds a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: WireMethod::Get,
            path: path.into(),
            query: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Builds a POST request carrying `body`.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: WireMethod::Post,
            path: path.into(),
            query: HashMap::new(),
            body,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Looks up a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Decodes a raw query string (`a=1&b=x%20y`) into a parameter map.
    ///
    /// Undecodable pairs are dropped; a key without `=` maps to the empty
    /// string.
    #[must_use]
    pub fn parse_query(raw: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        for pair in raw.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let (Ok(key), Ok(value)) = (urlencoding::decode(key), urlencoding::decode(value))
            else {
                continue;
            };
            params.insert(key.into_owned(), value.into_owned());
        }
        params
    }
}

/// One response as produced by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body (checkout payload or query listing).
    pub body: Vec<u8>,
}

impl WireResponse {
    /// 200 with a body.
    #[must_use]
    pub fn ok(body: Vec<u8>) -> Self {
        Self { status: 200, body }
    }

    /// An empty-bodied response with the given status.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}
