//! Error types for the inference module

use thiserror::Error;

/// Inference service client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Endpoint or model name cannot form a valid URL
    #[error("Invalid endpoint: {reason}")]
    InvalidEndpoint { reason: String },

    /// Connection-level failure
    #[error("Network error: {reason}")]
    NetworkError { reason: String },

    /// Request timed out
    #[error("Inference request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Service answered 429
    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimitExceeded { retry_after_secs: u64 },

    /// Non-success HTTP status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// Service reported an error in an otherwise successful response
    #[error("Inference service error: {message}")]
    ServiceError { message: String },

    /// Response body did not match the expected shape
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Client could not be constructed
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },
}

impl InferenceError {
    /// Transport-level failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::NetworkError { .. }
                | InferenceError::Timeout { .. }
                | InferenceError::RateLimitExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for InferenceError {
    fn from(err: serde_json::Error) -> Self {
        InferenceError::SerializationError {
            reason: err.to_string(),
        }
    }
}

/// Result type for inference operations
pub type InferenceResult<T> = Result<T, InferenceError>;
