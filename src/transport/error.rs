use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    /// A required option is missing or invalid; raised at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Could not resolve host '{host}': {reason}")]
    Resolution { host: String, reason: String },

    #[error("Message too large: requires {chunks} chunks (max {max})")]
    PayloadTooLarge { chunks: usize, max: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport is closed")]
    Closed,
}

impl TransportError {
    /// Whether the error should stop the transport from being built.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransportError::Configuration(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropertyError {
    #[error("Unknown property '{key}' on transport {transport}")]
    Unknown { transport: String, key: String },

    #[error("Invalid value for property '{key}' on transport {transport}: {reason}")]
    Invalid {
        transport: String,
        key: String,
        reason: String,
    },
}
