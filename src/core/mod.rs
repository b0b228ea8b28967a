//! VisXAI Core Module
//!
//! Configuration loading and the crate-wide error type.

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{
    AppConfig, AssetsConfig, ConfigError, ConfigResult, InferenceConfig, ServerConfig, ENV_PREFIX,
};
pub use error::{Result, VisxError};
