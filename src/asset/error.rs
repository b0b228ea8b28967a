//! Asset server error types

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Asset server error type
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Missing path parameter")]
    MissingPath,

    #[error("Invalid path: {reason}")]
    InvalidPath { reason: String },

    #[error("Path escapes base directory: '{requested}'")]
    Forbidden { requested: String },

    #[error("Asset not found: {requested}")]
    NotFound { requested: String },

    #[error("Invalid base directory '{path}': {reason}")]
    InvalidBaseDirectory { path: String, reason: String },

    #[error("Server bind failed: {reason}")]
    BindFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {reason}")]
    Internal { reason: String },
}

impl AssetError {
    /// Check if this error should result in a 400 Bad Request response
    pub fn is_bad_request(&self) -> bool {
        matches!(self, AssetError::MissingPath | AssetError::InvalidPath { .. })
    }

    /// Check if this error should result in a 403 Forbidden response
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AssetError::Forbidden { .. })
    }

    /// Check if this error should result in a 404 Not Found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        if self.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else if self.is_forbidden() {
            StatusCode::FORBIDDEN
        } else if self.is_not_found() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Message sent to the client. Never includes filesystem paths.
    pub fn public_message(&self) -> &'static str {
        match self {
            AssetError::MissingPath => "Missing path parameter",
            AssetError::InvalidPath { .. } => "Invalid path parameter",
            AssetError::Forbidden { .. } => "Invalid path",
            AssetError::NotFound { .. } => "File not found",
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for AssetError {
    fn into_response(self) -> Response {
        let headers = [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CACHE_CONTROL, "no-cache"),
        ];
        (self.status_code(), headers, self.public_message()).into_response()
    }
}
