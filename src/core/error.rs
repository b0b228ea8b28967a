//! Error types for the VisXAI server
//!
//! Each module owns its error enum; `VisxError` gathers them for the binary
//! and for callers that cross module boundaries.

use thiserror::Error;

use crate::asset::AssetError;
use crate::core::config::ConfigError;
use crate::inference::InferenceError;
use crate::logging::LoggingError;

/// Result type alias for VisXAI operations
pub type Result<T> = std::result::Result<T, VisxError>;

/// Main error type for the VisXAI server
#[derive(Error, Debug)]
pub enum VisxError {
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisxError {
    /// Whether the failure is a startup misconfiguration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            VisxError::Config(_)
                | VisxError::Asset(AssetError::InvalidBaseDirectory { .. })
                | VisxError::Inference(InferenceError::InvalidEndpoint { .. })
                | VisxError::Inference(InferenceError::ConfigError { .. })
        )
    }
}
