//! Configuration module for the VisXAI server
//!
//! Settings are layered, later sources winning:
//! 1. Built-in defaults
//! 2. Optional config file (JSON, TOML or YAML, chosen by extension)
//! 3. Environment variables, `VISXAI_<SECTION>__<KEY>`
//!    (e.g. `VISXAI_ASSETS__BASE_DIRECTORY=/srv/out`)
//! 4. Command-line overrides, applied by the binary
//!
//! The asset base directory has no default and must be supplied.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::{
    default_allowed_origins, AssetServerConfig, BaseDirectory, DEFAULT_ASSET_SERVER_PORT,
    DEFAULT_CACHE_MAX_AGE_SECS,
};
use crate::inference::InferenceClientConfig;
use crate::logging::LoggingConfig;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "VISXAI";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Asset base directory is not configured (set assets.base_directory, VISXAI_ASSETS__BASE_DIRECTORY or --base-dir)")]
    MissingBaseDirectory,

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Asset serving settings
    #[serde(default)]
    pub assets: AssetsConfig,

    /// External inference service settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Asset serving settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Root directory for served files
    #[serde(default)]
    pub base_directory: Option<PathBuf>,

    /// `max-age` of the Cache-Control header on served files
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age_secs: u64,
}

/// External inference service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_inference_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    DEFAULT_ASSET_SERVER_PORT
}

fn default_cache_max_age() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

fn default_inference_endpoint() -> String {
    InferenceClientConfig::default().endpoint
}

fn default_timeout_ms() -> u64 {
    InferenceClientConfig::default().timeout_ms
}

fn default_max_retries() -> u32 {
    InferenceClientConfig::default().max_retries
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            base_directory: None,
            cache_max_age_secs: default_cache_max_age(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_inference_endpoint(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

impl AppConfig {
    /// Load from an optional file and the process environment
    pub fn load(file: Option<&Path>) -> ConfigResult<Self> {
        Self::load_from(file, None)
    }

    /// Load from an optional file and an explicit environment map
    ///
    /// `env` replaces the process environment when given.
    pub fn load_from(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let environment = config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env.map(|vars| vars.into_iter().collect()));

        let settings: AppConfig = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Validate the configured base directory
    ///
    /// Fails when it is unset, missing, not a directory or unreadable.
    pub fn base_directory(&self) -> ConfigResult<BaseDirectory> {
        let path = self
            .assets
            .base_directory
            .as_ref()
            .ok_or(ConfigError::MissingBaseDirectory)?;
        BaseDirectory::new(path).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Asset server settings derived from this configuration
    pub fn asset_server_config(&self) -> AssetServerConfig {
        AssetServerConfig {
            bind_address: self.server.bind_address,
            port: self.server.port,
            allowed_origins: self.server.allowed_origins.clone(),
            cache_max_age_secs: self.assets.cache_max_age_secs,
        }
    }

    /// Inference client settings derived from this configuration
    pub fn inference_client_config(&self) -> InferenceClientConfig {
        InferenceClientConfig {
            endpoint: self.inference.endpoint.clone(),
            timeout_ms: self.inference.timeout_ms,
            max_retries: self.inference.max_retries,
        }
    }
}
