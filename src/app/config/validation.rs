use super::{ConfigError, LoggerConfig, TransportConfig};
use serde_json::Value;

/// Options that must be a positive integer when present.
const POSITIVE_OPTIONS: &[&str] = &["buffer_size", "chunk_size", "write_timeout"];

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, transport) in self.transports.iter().flatten().enumerate() {
            transport
                .validate()
                .map_err(|reason| ConfigError::InvalidConfig(format!("transports[{index}]: {reason}")))?;
        }
        Ok(())
    }
}

impl TransportConfig {
    fn validate(&self) -> Result<(), String> {
        if self.kind.trim().is_empty() {
            return Err("transport type must not be empty".to_string());
        }

        for key in POSITIVE_OPTIONS {
            if let Some(value) = self.options.get(*key) {
                if value.as_u64().is_none_or(|n| n == 0) {
                    return Err(format!("{key} must be greater than 0"));
                }
            }
        }

        let required = match self.kind.to_lowercase().as_str() {
            "file" => Some("filename"),
            "graylog" => Some("host"),
            _ => None,
        };

        if let Some(key) = required {
            match self.options.get(key) {
                Some(Value::String(s)) if !s.is_empty() => {}
                _ => return Err(format!("{} transport requires '{key}'", self.kind)),
            }
        }

        Ok(())
    }
}
