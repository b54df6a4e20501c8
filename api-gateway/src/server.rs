//! Local HTTP server for running the API outside AWS Lambda.
//!
//! Every request is buffered and handed to the same `handler` Lambda uses.

use axum::body::{to_bytes, Body as AxumBody};
use axum::extract::Request as AxumRequest;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Router;
use lambda_http::Body;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::routes::handler;
use crate::AppState;

/// Largest request body accepted, uploads included.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Build the router that forwards everything to `handler`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(move |request: AxumRequest| {
        let state = Arc::clone(&state);
        async move { forward(state, request).await }
    })
}

/// Serve the API on `0.0.0.0:port` until the process stops.
pub async fn serve(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("Calendar API listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn forward(state: Arc<AppState>, request: AxumRequest) -> AxumResponse {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("Failed to read request body: {}", e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };

    let body = if bytes.is_empty() {
        Body::Empty
    } else {
        Body::from(bytes.to_vec())
    };
    let event = lambda_http::Request::from_parts(parts, body);

    match handler(state, event).await {
        Ok(response) => {
            let (parts, body) = response.into_parts();
            AxumResponse::from_parts(parts, AxumBody::from(body.as_ref().to_vec()))
        }
        Err(e) => {
            error!("Handler failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
