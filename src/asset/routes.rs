//! Asset server routes and middleware
//!
//! Provides the HTTP handler that streams files from the base directory and a
//! middleware layer that adds security response headers.

use axum::{
    body::Body,
    extract::{Query, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::error::AssetError;
use super::server::AssetServerState;

/// Query parameters for asset requests
#[derive(Debug, Deserialize)]
pub struct AssetParams {
    /// Path relative to the base directory
    pub path: Option<String>,
}

/// Adds security response headers to every response
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    // Prevent MIME type sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    // Prevent clickjacking
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));

    response
}

/// Stream an asset from the base directory
///
/// Route: GET /assets?path={relative} (also GET /api/images)
pub async fn serve_asset(
    State(state): State<AssetServerState>,
    Query(params): Query<AssetParams>,
) -> Response {
    match state.resolver.resolve_and_serve(params.path.as_deref()).await {
        Ok(asset) => {
            // Dropping the stream (client disconnect) closes the file
            let body = Body::from_stream(ReaderStream::new(asset.file));
            let headers = [
                (header::CONTENT_TYPE, HeaderValue::from_static(asset.content_type)),
                (header::CACHE_CONTROL, state.cache_control().clone()),
                (header::CONTENT_LENGTH, HeaderValue::from(asset.content_length)),
            ];
            (StatusCode::OK, headers, body).into_response()
        }
        Err(e) => {
            log_failure(params.path.as_deref(), &e);
            e.into_response()
        }
    }
}

/// Health check
///
/// Route: GET /health
pub async fn health() -> &'static str {
    "OK"
}

fn log_failure(requested: Option<&str>, error: &AssetError) {
    let requested = requested.unwrap_or("");
    match error {
        // Already reported on the security target by the resolver
        AssetError::Forbidden { .. } => {}
        AssetError::MissingPath | AssetError::InvalidPath { .. } => {
            tracing::debug!(requested, "Rejected asset request: {}", error);
        }
        AssetError::NotFound { .. } => {
            tracing::info!(requested, "Asset not found");
        }
        _ => {
            tracing::error!(requested, "Failed to serve asset: {}", error);
        }
    }
}
