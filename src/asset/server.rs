//! Asset Stream Server implementation
//!
//! Binds an HTTP listener that streams files out of a single base directory:
//! - Traversal-safe path resolution (see [`AssetResolver`])
//! - CORS restricted to configured front-end origins
//! - Security and cache response headers

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::{
    http::{request::Parts, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use reqwest::Url;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::error::AssetError;
use super::resolver::{AssetResolver, BaseDirectory};
use super::routes::{health, security_headers, serve_asset};

/// Default port for the asset server
pub const DEFAULT_ASSET_SERVER_PORT: u16 = 8765;

/// Default `max-age` for served assets
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 3600;

/// Asset server configuration
#[derive(Clone, Debug)]
pub struct AssetServerConfig {
    /// Address to bind to
    pub bind_address: IpAddr,
    /// Port to bind to (0 picks a free port)
    pub port: u16,
    /// Origins allowed by CORS
    pub allowed_origins: Vec<String>,
    /// `max-age` for the Cache-Control header of served assets
    pub cache_max_age_secs: u64,
}

impl Default for AssetServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_ASSET_SERVER_PORT,
            allowed_origins: default_allowed_origins(),
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
        }
    }
}

/// Dev-server origins of the visualization front end
pub fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://127.0.0.1:3000".to_string(),
    ]
}

impl AssetServerConfig {
    /// Create a new configuration with a custom port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Socket address to bind
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Cache-Control value for successful asset responses
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age_secs)
    }
}

/// Shared state for the asset server
#[derive(Clone)]
pub struct AssetServerState {
    /// Path resolver bound to the base directory
    pub resolver: Arc<AssetResolver>,
    /// Configuration
    pub config: Arc<AssetServerConfig>,
    cache_control: HeaderValue,
}

impl AssetServerState {
    /// Create a new server state
    pub fn new(resolver: AssetResolver, config: AssetServerConfig) -> Result<Self, AssetError> {
        let cache_control = HeaderValue::from_str(&config.cache_control()).map_err(|e| {
            AssetError::Internal {
                reason: format!("invalid Cache-Control value: {}", e),
            }
        })?;

        Ok(Self {
            resolver: Arc::new(resolver),
            config: Arc::new(config),
            cache_control,
        })
    }

    /// Cache-Control header for successful responses
    pub fn cache_control(&self) -> &HeaderValue {
        &self.cache_control
    }

    /// Check if an origin is allowed
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.config.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Asset Stream Server
pub struct AssetServer {
    /// Server state (shared with handlers)
    state: AssetServerState,
}

impl AssetServer {
    /// Create a server for `base` with the given configuration
    pub fn new(base: BaseDirectory, config: AssetServerConfig) -> Result<Self, AssetError> {
        let resolver = AssetResolver::new(base);
        Ok(Self {
            state: AssetServerState::new(resolver, config)?,
        })
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();

        let origins = self.state.clone();
        let cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers(Any)
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
                origin
                    .to_str()
                    .map(|o| origins.is_origin_allowed(o))
                    .unwrap_or(false)
            }));

        // Security headers wrap CORS so preflight answers carry them too
        Router::new()
            .route("/assets", get(serve_asset))
            .route("/api/images", get(serve_asset))
            .route("/health", get(health))
            .layer(cors)
            .layer(middleware::from_fn(security_headers))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, AssetError> {
        let addr = self.state.config.socket_addr();
        TcpListener::bind(addr)
            .await
            .map_err(|e| AssetError::BindFailed {
                reason: format!("{}: {}", addr, e),
            })
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), AssetError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();

        tracing::info!(
            addr = %listener.local_addr()?,
            base = %self.state.resolver.base().display(),
            "Asset server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AssetError::Internal {
                reason: e.to_string(),
            })?;

        tracing::info!("Asset server stopped");
        Ok(())
    }

    /// URL for an asset, with the path query-encoded
    pub fn asset_url(&self, relative_path: &str) -> Result<Url, AssetError> {
        let base = format!("http://{}/assets", self.state.config.socket_addr());
        Url::parse_with_params(&base, &[("path", relative_path)]).map_err(|e| {
            AssetError::Internal {
                reason: format!("failed to build asset URL: {}", e),
            }
        })
    }
}
