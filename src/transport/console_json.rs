use super::error::{PropertyError, TransportError};
use super::properties::{FilterOptions, FilterOverrides, PropertyBag, read_property, write_property};
use super::Transport;
use crate::buffer::{BatchWriter, StdoutWriter};
use crate::domain::LogRecord;
use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

pub const CONSOLE_JSON_NAME: &str = "ConsoleJSON";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleJsonSettings {
    /// Indent width; 0 prints each record on a single line.
    pub spacing: usize,
}

impl Default for ConsoleJsonSettings {
    fn default() -> Self {
        Self { spacing: 4 }
    }
}

/// Prints each record as a JSON document.
#[derive(Debug)]
pub struct ConsoleJsonTransport {
    filters: FilterOverrides,
    settings: PropertyBag<ConsoleJsonSettings>,
    writer: Arc<dyn BatchWriter>,
}

impl ConsoleJsonTransport {
    pub fn new(settings: ConsoleJsonSettings) -> Self {
        Self::with_writer(settings, FilterOverrides::default(), Arc::new(StdoutWriter))
    }

    pub fn with_writer(
        settings: ConsoleJsonSettings,
        filters: FilterOverrides,
        writer: Arc<dyn BatchWriter>,
    ) -> Self {
        Self {
            filters,
            settings: PropertyBag::new(settings),
            writer,
        }
    }

    pub fn from_options(options: &Map<String, Value>) -> Result<Self, TransportError> {
        let value = Value::Object(options.clone());
        let filters: FilterOptions = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::Configuration(format!("console_json filters: {e}")))?;
        let settings: ConsoleJsonSettings = serde_json::from_value(value)
            .map_err(|e| TransportError::Configuration(format!("console_json options: {e}")))?;

        Ok(Self::with_writer(
            settings,
            FilterOverrides::from_options(filters),
            Arc::new(StdoutWriter),
        ))
    }
}

/// Serialize `value` with an indent of `spacing` spaces.
pub fn to_json_with_spacing<T: Serialize>(value: &T, spacing: usize) -> Result<String, TransportError> {
    if spacing == 0 {
        return Ok(serde_json::to_string(value)?);
    }

    let indent = " ".repeat(spacing);
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
    value.serialize(&mut serializer)?;

    String::from_utf8(out).map_err(|e| TransportError::Configuration(e.to_string()))
}

impl Transport for ConsoleJsonTransport {
    fn name(&self) -> &str {
        CONSOLE_JSON_NAME
    }

    fn filters(&self) -> &FilterOverrides {
        &self.filters
    }

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError> {
        let spacing = self.settings.read().spacing;
        let json = to_json_with_spacing(record.as_ref(), spacing)?;
        self.writer.write_batch(json)
    }

    fn property(&self, key: &str) -> Option<Value> {
        read_property(&self.filters, &self.settings, key)
    }

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError> {
        write_property(CONSOLE_JSON_NAME, &self.filters, &self.settings, key, value)
    }
}
