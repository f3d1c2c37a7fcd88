use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::panic::Location;

/// Named properties attached to a record.
pub type Properties = Map<String, Value>;

/// Call-site and timing information captured when a record is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMeta {
    /// RFC 3339 timestamp with millisecond precision.
    pub date: String,
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    /// Full trace, only present when a producer supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

impl LogMeta {
    fn at(now: DateTime<Utc>, location: &Location<'_>) -> Self {
        Self {
            date: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            caller: None,
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            column: Some(location.column()),
            trace: None,
        }
    }
}

/// A finished log record.
///
/// Records are built once per `log` call and shared with every matching
/// transport as `Arc<LogRecord>`; nothing mutates them after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub group: String,
    pub message: String,
    pub properties: Properties,
    pub meta: LogMeta,
    /// Seconds since the unix epoch, with millisecond precision.
    pub unix_timestamp: f64,
}

/// Extra arguments passed alongside a message.
///
/// Producers say explicitly whether an argument is a set of named
/// properties or a positional value; positional values are stored as
/// `_argument{index}`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogArg {
    Properties(Properties),
    Value(Value),
}

impl LogArg {
    /// A single named property.
    pub fn property(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = Properties::new();
        map.insert(key.into(), value.into());
        Self::Properties(map)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

impl From<Properties> for LogArg {
    fn from(properties: Properties) -> Self {
        Self::Properties(properties)
    }
}

impl LogRecord {
    /// Build a record with no extra arguments, capturing the caller's location.
    #[track_caller]
    pub fn new(group: impl Into<String>, message: impl Into<String>) -> Self {
        Self::build(group, message, Vec::new(), Location::caller())
    }

    /// Build a record from a group, a finished message and tagged arguments.
    pub fn build(
        group: impl Into<String>,
        message: impl Into<String>,
        args: impl IntoIterator<Item = LogArg>,
        location: &Location<'_>,
    ) -> Self {
        let now = Utc::now();

        Self {
            group: group.into(),
            message: message.into(),
            properties: merge_args(args),
            meta: LogMeta::at(now, location),
            unix_timestamp: now.timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.meta.caller = Some(caller.into());
        self
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.meta.trace = Some(trace);
        self
    }
}

/// Flatten tagged arguments into one property map.
///
/// Later property maps overwrite earlier keys; positional values keep
/// their argument index so they never collide with each other.
pub fn merge_args(args: impl IntoIterator<Item = LogArg>) -> Properties {
    let mut properties = Properties::new();

    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            LogArg::Properties(map) => properties.extend(map),
            LogArg::Value(value) => {
                properties.insert(format!("_argument{index}"), value);
            }
        }
    }

    properties
}
