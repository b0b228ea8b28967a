//! Asset Streaming Server
//!
//! Serves feature-map images and other texture files from a single configured
//! base directory to the visualization front end.
//!
//! Security features:
//! - Component-wise containment check on normalized paths
//! - Symlink escape detection after canonicalization
//! - Security response headers (X-Content-Type-Options, X-Frame-Options)
//! - Traversal attempts logged on the `security` target

mod error;
mod mime;
mod resolver;
mod routes;
mod server;

pub use error::AssetError;
pub use mime::{content_type_for, mime_for_extension, DEFAULT_CONTENT_TYPE};
pub use resolver::{
    is_contained, normalize, relative_to, AssetRequest, AssetResolver, AssetResponse,
    BaseDirectory, ResolvedPath,
};
pub use routes::{health, security_headers, serve_asset, AssetParams};
pub use server::{
    default_allowed_origins, AssetServer, AssetServerConfig, AssetServerState,
    DEFAULT_ASSET_SERVER_PORT, DEFAULT_CACHE_MAX_AGE_SECS,
};
