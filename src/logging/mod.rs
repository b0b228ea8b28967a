//! Logging System for the VisXAI server
//!
//! Provides structured logs with configurable verbosity levels, console and
//! rolling-file outputs, and text or JSON formatting. Security events (blocked
//! path traversal) are emitted on the `security` target so they can be routed
//! or filtered independently.

mod config;


pub use config::{
    default_log_directory, LogFormat, LogLevel, LogOutput, LoggingConfig, RotationStrategy,
    SECURITY_TARGET,
};

use std::path::PathBuf;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log file name prefix inside the log directory
pub const LOG_FILE_NAME: &str = "visxai-server.log";

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),
}

/// Result type for logging operations
pub type LoggingResult<T> = Result<T, LoggingError>;

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Handle to the installed global subscriber
///
/// Keeps the non-blocking file writer alive; dropping it flushes file output.
pub struct LoggingSystem {
    config: LoggingConfig,
    _guard: Option<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber described by `config`
    pub fn init(config: LoggingConfig) -> LoggingResult<Self> {
        let console = config.writes_console().then(|| Self::console_layer(&config));
        let (file, guard) = if config.writes_file() {
            let (layer, guard) = Self::file_layer(&config)?;
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

        tracing_subscriber::registry()
            .with(Self::build_env_filter(&config))
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| LoggingError::InitializationError(e.to_string()))?;

        Ok(Self {
            config,
            _guard: guard,
        })
    }

    /// `RUST_LOG`, when set, takes precedence over the configured levels.
    pub(crate) fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
        Self::filter_from_config(config)
    }

    pub(crate) fn filter_from_config(config: &LoggingConfig) -> EnvFilter {
        let mut filter = EnvFilter::default().add_directive(config.level.to_tracing_level().into());

        for directive in config.directives() {
            match directive.parse() {
                Ok(parsed) => filter = filter.add_directive(parsed),
                Err(e) => eprintln!("Ignoring invalid log directive '{}': {}", directive, e),
            }
        }

        filter
    }

    fn console_layer<S>(config: &LoggingConfig) -> BoxedLayer<S>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        }
    }

    fn file_layer<S>(config: &LoggingConfig) -> LoggingResult<(BoxedLayer<S>, WorkerGuard)>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let log_dir = config.resolved_log_directory();
        std::fs::create_dir_all(&log_dir).map_err(|e| {
            LoggingError::DirectoryCreationError(format!("{}: {}", log_dir.display(), e))
        })?;

        let appender = RollingFileAppender::new(config.rotation.to_rotation(), &log_dir, LOG_FILE_NAME);
        let (writer, guard) = tracing_appender::non_blocking(appender);

        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        let layer = match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Text => layer.boxed(),
        };
        Ok((layer, guard))
    }

    /// Directory log files are written to, if file output is enabled
    pub fn log_directory(&self) -> Option<PathBuf> {
        self.config
            .writes_file()
            .then(|| self.config.resolved_log_directory())
    }
}
