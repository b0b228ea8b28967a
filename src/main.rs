//! VisXAI server
//!
//! Main entry point: loads configuration, initializes logging and serves
//! assets until Ctrl-C.

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use visxai_server::asset::AssetServer;
use visxai_server::core::AppConfig;
use visxai_server::inference::InferenceClient;
use visxai_server::logging::{LogFormat, LogLevel, LoggingSystem};

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "visxai-server", version, about = "Serve visualization assets from a base directory")]
struct Cli {
    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory assets are served from
    #[arg(long, value_name = "DIR", env = "VISXAI_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Address to bind
    #[arg(long, value_name = "ADDR")]
    bind: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Log at debug level, including per-request spans
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line values override every other source
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.base_dir {
            config.assets.base_directory = Some(dir.clone());
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if self.json_logs {
            config.logging.format = LogFormat::Json;
        }
        if self.verbose {
            config.logging.level = LogLevel::Debug;
            config.logging.request_spans = true;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);

    // Keep the logging system alive so file writers flush on exit
    let _logging_system = match LoggingSystem::init(config.logging.clone()) {
        Ok(system) => {
            if let Some(dir) = system.log_directory() {
                tracing::info!("Writing log files to {}", dir.display());
            }
            Some(system)
        }
        Err(e) => {
            // Fall back to basic logging if the configured setup fails
            eprintln!("Failed to initialize logging system: {}. Using basic logging.", e);
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                )
                .init();
            None
        }
    };

    tracing::info!("Starting VisXAI server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config).await {
        if e.is_configuration() {
            tracing::error!("Invalid configuration: {}", e);
        } else {
            tracing::error!("Server failed: {}", e);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Validate the configuration, then serve assets until Ctrl-C
async fn run(config: &AppConfig) -> visxai_server::Result<()> {
    let base = config.base_directory()?;

    // Only validated here; the view layer talks to the model backend itself
    let inference = InferenceClient::new(config.inference_client_config())?;
    tracing::info!(
        endpoint = %inference.config().endpoint,
        timeout_ms = inference.config().timeout_ms,
        "Inference service configured"
    );

    let server = AssetServer::new(base, config.asset_server_config())?;
    let listener = server.bind().await?;
    server.serve(listener, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
