//! Logging configuration types
//!
//! Deserialized from the `[logging]` section of the server configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_appender::rolling::Rotation;

/// Target of blocked path traversal events
pub const SECURITY_TARGET: &str = "security";

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers
    Json,
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

/// When the log file rolls over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl RotationStrategy {
    pub fn to_rotation(&self) -> Rotation {
        match self {
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Never => Rotation::NEVER,
        }
    }
}

/// Logging settings of the server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for everything without a module override
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Directory for rolling log files. Platform data dir when unset.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    #[serde(default)]
    pub rotation: RotationStrategy,

    /// Per-target level overrides, e.g. `{"visxai_server::inference": "debug"}`
    #[serde(default)]
    pub module_levels: HashMap<String, LogLevel>,

    /// Emit tower-http spans for every request. Off keeps `tower_http` at warn.
    #[serde(default)]
    pub request_spans: bool,

    /// Include file and line number in log lines
    #[serde(default)]
    pub include_file_info: bool,
}

impl LoggingConfig {
    /// Filter directives below the global level, later ones winning
    ///
    /// Blocked traversal attempts are always kept at warn or louder, even
    /// when the global level is `error`.
    pub fn directives(&self) -> Vec<String> {
        let mut directives = Vec::new();
        if self.level == LogLevel::Error {
            directives.push(format!("{}={}", SECURITY_TARGET, LogLevel::Warn));
        }
        if !self.request_spans {
            directives.push(format!("tower_http={}", LogLevel::Warn));
        }

        let mut overrides: Vec<_> = self.module_levels.iter().collect();
        overrides.sort_by(|a, b| a.0.cmp(b.0));
        directives.extend(
            overrides
                .into_iter()
                .map(|(module, level)| format!("{}={}", module, level)),
        );
        directives
    }

    pub fn writes_console(&self) -> bool {
        matches!(self.output, LogOutput::Console | LogOutput::Both)
    }

    pub fn writes_file(&self) -> bool {
        matches!(self.output, LogOutput::File | LogOutput::Both)
    }

    /// Directory log files are written to
    pub fn resolved_log_directory(&self) -> PathBuf {
        self.log_directory
            .clone()
            .unwrap_or_else(default_log_directory)
    }
}

/// Platform data directory for logs, `./logs` when there is none
pub fn default_log_directory() -> PathBuf {
    match dirs::data_local_dir() {
        Some(data_dir) => data_dir.join("visxai").join("logs"),
        None => PathBuf::from("logs"),
    }
}
