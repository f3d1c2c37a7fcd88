use super::console_json::to_json_with_spacing;
use super::error::{PropertyError, TransportError};
use super::properties::{FilterOptions, FilterOverrides, PropertyBag, read_property, write_property};
use super::Transport;
use crate::app::config::serde_helpers;
use crate::buffer::{BufferConfig, BufferedSink, FileAppender};
use crate::domain::{LogRecord, Properties};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const FILE_NAME: &str = "File";

const FILE_SPACING: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub filename: PathBuf,
    pub buffer_size: usize,
    #[serde(with = "serde_helpers")]
    pub write_timeout: Duration,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            buffer_size: 100,
            write_timeout: Duration::from_millis(100),
        }
    }
}

impl FileSettings {
    pub fn new(filename: impl Into<PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            buffer_size: self.buffer_size,
            write_timeout: self.write_timeout,
        }
    }
}

/// What a file transport persists for each record.
#[derive(Debug, Serialize)]
struct FileEntry<'a> {
    group: &'a str,
    message: &'a str,
    timestamp: &'a str,
    properties: &'a Properties,
}

/// Appends records to a file as pretty-printed JSON.
///
/// Entries are buffered and written in bulk by a single background task,
/// so appends keep their order.
#[derive(Debug)]
pub struct FileTransport {
    filters: FilterOverrides,
    settings: PropertyBag<FileSettings>,
    appender: Arc<FileAppender>,
    buffer: BufferedSink,
}

impl FileTransport {
    /// Must be called inside a tokio runtime.
    pub fn new(settings: FileSettings) -> Result<Self, TransportError> {
        Self::with_filters(settings, FilterOverrides::default())
    }

    pub fn with_filters(settings: FileSettings, filters: FilterOverrides) -> Result<Self, TransportError> {
        validate(&settings)?;

        let appender = Arc::new(FileAppender::spawn(settings.filename.clone())?);
        let buffer = BufferedSink::new(appender.clone(), settings.buffer_config());

        debug!(path = %settings.filename.display(), "Created file transport");

        Ok(Self {
            filters,
            settings: PropertyBag::new(settings),
            appender,
            buffer,
        })
    }

    pub fn from_options(options: &Map<String, Value>) -> Result<Self, TransportError> {
        let value = Value::Object(options.clone());
        let filters: FilterOptions = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::Configuration(format!("file filters: {e}")))?;
        let settings: FileSettings = serde_json::from_value(value)
            .map_err(|e| TransportError::Configuration(format!("file options: {e}")))?;

        Self::with_filters(settings, FilterOverrides::from_options(filters))
    }

    pub fn settings(&self) -> FileSettings {
        self.settings.snapshot()
    }

    pub fn flush(&self) {
        self.buffer.flush();
    }

    /// Flush, then wait until every queued entry has reached the file.
    pub async fn shutdown(&self) {
        self.buffer.close();
        self.appender.shutdown().await;
    }
}

fn validate(settings: &FileSettings) -> Result<(), TransportError> {
    if settings.filename.as_os_str().is_empty() {
        return Err(TransportError::Configuration(
            "file transport requires a filename".to_string(),
        ));
    }
    if settings.buffer_size == 0 {
        return Err(TransportError::Configuration(
            "file buffer_size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

impl Transport for FileTransport {
    fn name(&self) -> &str {
        FILE_NAME
    }

    fn filters(&self) -> &FilterOverrides {
        &self.filters
    }

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError> {
        let entry = FileEntry {
            group: &record.group,
            message: &record.message,
            timestamp: &record.meta.date,
            properties: &record.properties,
        };

        self.buffer.write(to_json_with_spacing(&entry, FILE_SPACING)?);
        Ok(())
    }

    fn property(&self, key: &str) -> Option<Value> {
        read_property(&self.filters, &self.settings, key)
    }

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError> {
        if FilterOverrides::is_filter_key(key) {
            return write_property(FILE_NAME, &self.filters, &self.settings, key, value);
        }

        self.settings
            .set_validated(FILE_NAME, key, value, |s| validate(s).map_err(|e| e.to_string()))?;

        let settings = self.settings.read();
        if key == "filename" {
            // Entries already buffered belong to the old file
            self.buffer.flush();
            self.appender.set_path(settings.filename.clone());
        }
        self.buffer.set_config(settings.buffer_config());
        Ok(())
    }

    fn close(&self) {
        self.buffer.close();
        self.appender.close();
    }
}
