mod loader;
pub mod serde_helpers;
mod validation;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

/// Verbosity of the router's own diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl DiagnosticLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticLevel::Error => "error",
            DiagnosticLevel::Warn => "warn",
            DiagnosticLevel::Info => "info",
            DiagnosticLevel::Debug => "debug",
            DiagnosticLevel::Trace => "trace",
        }
    }
}

impl fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiagnosticLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(DiagnosticLevel::Error),
            "warn" | "warning" => Ok(DiagnosticLevel::Warn),
            "info" => Ok(DiagnosticLevel::Info),
            "debug" => Ok(DiagnosticLevel::Debug),
            "trace" => Ok(DiagnosticLevel::Trace),
            other => Err(format!("unknown level '{other}'")),
        }
    }
}

impl From<DiagnosticLevel> for tracing::Level {
    fn from(level: DiagnosticLevel) -> Self {
        match level {
            DiagnosticLevel::Error => tracing::Level::ERROR,
            DiagnosticLevel::Warn => tracing::Level::WARN,
            DiagnosticLevel::Info => tracing::Level::INFO,
            DiagnosticLevel::Debug => tracing::Level::DEBUG,
            DiagnosticLevel::Trace => tracing::Level::TRACE,
        }
    }
}

pub use loader::{CONFIG_PATH_ENV, LoggerConfig, TransportConfig};
