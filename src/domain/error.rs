use thiserror::Error;

/// Top-level error type for the router.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("Property error: {0}")]
    Property(#[from] crate::transport::PropertyError),
}
