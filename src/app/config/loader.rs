use super::serde_helpers::{load_env_enabled, load_env_specs, load_env_var};
use super::{ConfigError, DiagnosticLevel};
use crate::filter::{DisabledPolicy, EnabledPolicy};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Path of a TOML file read by `LoggerConfig::from_env`.
pub const CONFIG_PATH_ENV: &str = "RASK_LOG_CONFIG";

/// One `[[transports]]` table: a type identifier plus its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl TransportConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Logger settings as read from TOML and the environment.
///
/// ```toml
/// groups_enabled = ["api", "/^db:/"]
/// groups_disabled = ["api:health"]
///
/// [[transports]]
/// type = "console"
/// show_meta = false
///
/// [[transports]]
/// type = "graylog"
/// host = "graylog.internal"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub groups_enabled: EnabledPolicy,
    pub groups_disabled: DisabledPolicy,
    /// Build records even when no transport takes them.
    pub store_all_history: bool,
    pub diagnostic_level: DiagnosticLevel,
    /// `None` installs the default console transport.
    pub transports: Option<Vec<TransportConfig>>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            groups_enabled: EnabledPolicy::All,
            groups_disabled: Vec::new(),
            store_all_history: false,
            diagnostic_level: DiagnosticLevel::Warn,
            transports: None,
        }
    }
}

impl LoggerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LoggerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Start from `RASK_LOG_CONFIG` (or defaults) and apply the
    /// `LOG_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        load_env_enabled("LOG_GROUPS_ENABLED", &mut config.groups_enabled)?;
        load_env_specs("LOG_GROUPS_DISABLED", &mut config.groups_disabled)?;
        load_env_var("LOG_STORE_ALL_HISTORY", &mut config.store_all_history)?;
        load_env_var("LOG_DIAGNOSTIC_LEVEL", &mut config.diagnostic_level)?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::InvalidConfig(e.to_string()))
    }
}
