//! axum front end for the sync endpoints.

use crate::config::ServerConfig;
use crate::endpoint::SyncDispatcher;
use crate::request::{WireMethod, WireRequest};
use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;
use tracing::{error, info};

/// Builds the HTTP router over a dispatcher.
///
/// Every path is handled by the dispatcher (unknown ones come back `404`),
/// so a single fallback route carries the whole protocol.
pub fn router(dispatcher: Arc<SyncDispatcher>, max_body_bytes: usize) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(AppState {
            dispatcher,
            max_body_bytes,
        })
}

/// Binds the configured address and serves until the task is cancelled.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server loop fails.
pub async fn serve(config: ServerConfig, dispatcher: Arc<SyncDispatcher>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "sync server listening");
    axum::serve(listener, router(dispatcher, config.max_commit_bytes)).await
}

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<SyncDispatcher>,
    max_body_bytes: usize,
}

async fn dispatch(State(state): State<AppState>, request: axum::extract::Request) -> Response {
    let method = match *request.method() {
        Method::GET => WireMethod::Get,
        Method::POST => WireMethod::Post,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    let path = request.uri().path().to_string();
    let query = WireRequest::parse_query(request.uri().query().unwrap_or(""));

    let body = match axum::body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(bytes) => bytes.to_vec(),
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    let wire = WireRequest {
        method,
        path,
        query,
        body,
    };

    // The endpoint core is synchronous (disk-bound), so it runs off the
    // reactor.
    let dispatcher = Arc::clone(&state.dispatcher);
    let response = match tokio::task::spawn_blocking(move || dispatcher.handle(&wire)).await {
        Ok(response) => response,
        Err(e) => {
            error!(%e, "endpoint task panicked");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Body::from(response.body)).into_response()
}
