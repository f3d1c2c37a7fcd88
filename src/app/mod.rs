//! The logger value, its configuration and the router's own diagnostics.

pub mod config;
pub mod diagnostics;
pub mod logger;

pub use config::{ConfigError, DiagnosticLevel, LoggerConfig, TransportConfig};
pub use diagnostics::{DiagnosticsError, DiagnosticsSystem, init_diagnostics};
pub use logger::{Logger, LoggerOptions};

/// Read configuration from the environment, set up diagnostics and build
/// a logger.
pub fn logger_from_env() -> Result<Logger, crate::domain::RouterError> {
    let config = LoggerConfig::from_env()?;

    if let Err(e) = init_diagnostics(config.diagnostic_level) {
        // Another subscriber is already installed; keep using it
        tracing::debug!(error = %e, "Diagnostics not initialized");
    }

    Logger::from_config(&config)
}
