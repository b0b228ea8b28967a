//! VisXAI - asset and inference backend for the model visualization UI
//!
//! This crate provides:
//! - A read-only HTTP asset server confined to one base directory
//! - A client for the external model inference service; the binary only
//!   validates its endpoint, calls are made by library users
//! - Layered configuration (defaults, file, environment, CLI)
//! - Structured logging with console and rolling-file outputs

pub mod asset;
pub mod core;
pub mod inference;
pub mod logging;

// Re-export commonly used items
pub use asset::{AssetError, AssetResolver, AssetServer, AssetServerConfig, BaseDirectory};
pub use core::config::AppConfig;
pub use core::error::{Result, VisxError};
pub use inference::{InferenceClient, InferenceClientConfig, InferenceError};
pub use logging::{LoggingConfig, LoggingSystem};
