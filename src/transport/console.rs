use super::error::{PropertyError, TransportError};
use super::properties::{FilterOptions, FilterOverrides, PropertyBag, read_property, write_property};
use super::Transport;
use crate::app::config::serde_helpers;
use crate::buffer::{BatchWriter, BufferConfig, BufferedSink, StdoutWriter};
use crate::domain::LogRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub const CONSOLE_NAME: &str = "Console";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Print the date, caller and source location under each message.
    pub show_meta: bool,
    /// Print the record's trace when it carries one.
    pub show_stack_trace: bool,
    /// Append an empty line after each record.
    pub add_line_break: bool,
    /// Collect lines and print them in bulk.
    pub batch_enabled: bool,
    pub buffer_size: usize,
    #[serde(with = "serde_helpers")]
    pub write_timeout: Duration,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            show_meta: true,
            show_stack_trace: false,
            add_line_break: false,
            batch_enabled: false,
            buffer_size: 100,
            write_timeout: Duration::from_millis(100),
        }
    }
}

impl ConsoleSettings {
    fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            buffer_size: self.buffer_size,
            write_timeout: self.write_timeout,
        }
    }
}

/// Human-readable output, one block per record.
///
/// ```text
/// [ group ] 	message
///   2024-01-01T00:00:00.000Z	 caller: main 	    src/main.rs:10:5
/// ```
#[derive(Debug)]
pub struct ConsoleTransport {
    filters: FilterOverrides,
    settings: PropertyBag<ConsoleSettings>,
    writer: Arc<dyn BatchWriter>,
    buffer: BufferedSink,
}

impl ConsoleTransport {
    pub fn new(settings: ConsoleSettings) -> Self {
        Self::with_writer(settings, FilterOverrides::default(), Arc::new(StdoutWriter))
    }

    /// Build a console transport that prints through `writer`.
    pub fn with_writer(
        settings: ConsoleSettings,
        filters: FilterOverrides,
        writer: Arc<dyn BatchWriter>,
    ) -> Self {
        let buffer = BufferedSink::new(writer.clone(), settings.buffer_config());

        Self {
            filters,
            settings: PropertyBag::new(settings),
            writer,
            buffer,
        }
    }

    pub fn from_options(options: &Map<String, Value>) -> Result<Self, TransportError> {
        let value = Value::Object(options.clone());
        let filters: FilterOptions = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::Configuration(format!("console filters: {e}")))?;
        let settings: ConsoleSettings = serde_json::from_value(value)
            .map_err(|e| TransportError::Configuration(format!("console options: {e}")))?;

        validate(&settings)?;

        Ok(Self::with_writer(
            settings,
            FilterOverrides::from_options(filters),
            Arc::new(StdoutWriter),
        ))
    }

    pub fn settings(&self) -> ConsoleSettings {
        self.settings.snapshot()
    }

    /// Flush lines held by batch mode.
    pub fn flush(&self) {
        self.buffer.flush();
    }
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new(ConsoleSettings::default())
    }
}

/// Render a record the way the console transport prints it.
pub fn format_record(record: &LogRecord, settings: &ConsoleSettings) -> String {
    let mut out = format!("[ {} ] \t{}", record.group, record.message);

    if settings.show_meta {
        out.push_str("\n  ");
        out.push_str(&record.meta.date);
        out.push_str("\t ");

        if let Some(caller) = &record.meta.caller {
            out.push_str(&format!("caller: {caller} \t    "));
        }

        if let (Some(file), Some(line)) = (&record.meta.file, record.meta.line) {
            let column = record.meta.column.unwrap_or(0);
            out.push_str(&format!("{file}:{line}:{column}"));
        }
    }

    if settings.show_stack_trace {
        if let Some(trace) = &record.meta.trace {
            out.push_str("\n(Stack Trace)\n");
            for frame in trace {
                out.push('\t');
                out.push_str(frame);
                out.push('\n');
            }
        }
    }

    if settings.add_line_break {
        out.push('\n');
    }

    out
}

fn validate(settings: &ConsoleSettings) -> Result<(), TransportError> {
    if settings.batch_enabled && settings.buffer_size == 0 {
        return Err(TransportError::Configuration(
            "console buffer_size must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        CONSOLE_NAME
    }

    fn filters(&self) -> &FilterOverrides {
        &self.filters
    }

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError> {
        let (line, batched) = {
            let settings = self.settings.read();
            (format_record(record, &settings), settings.batch_enabled)
        };

        if batched {
            self.buffer.write(line);
            Ok(())
        } else {
            self.writer.write_batch(line)
        }
    }

    fn property(&self, key: &str) -> Option<Value> {
        read_property(&self.filters, &self.settings, key)
    }

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError> {
        if FilterOverrides::is_filter_key(key) {
            return write_property(CONSOLE_NAME, &self.filters, &self.settings, key, value);
        }

        self.settings
            .set_validated(CONSOLE_NAME, key, value, |s| validate(s).map_err(|e| e.to_string()))?;

        let settings = self.settings.read();
        self.buffer.set_config(settings.buffer_config());
        if !settings.batch_enabled {
            self.buffer.flush();
        }
        Ok(())
    }

    fn close(&self) {
        self.buffer.close();
    }
}
