//! GELF-style envelopes for the datagram transport.

use crate::domain::LogRecord;
use crate::transport::TransportError;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use serde_json::{Map, Value};
use std::io::Write;

pub const LEVEL_ERROR: u8 = 3;
pub const LEVEL_WARNING: u8 = 4;
pub const LEVEL_INFO: u8 = 6;

/// Syslog severity derived from the group's prefix.
pub fn severity(group: &str) -> u8 {
    if group.starts_with("error") {
        LEVEL_ERROR
    } else if group.starts_with("warn") {
        LEVEL_WARNING
    } else {
        LEVEL_INFO
    }
}

/// The group up to its first `:`, or the whole group.
pub fn base_group(group: &str) -> &str {
    group.split_once(':').map_or(group, |(base, _)| base)
}

/// Fields the transport contributes to every envelope.
#[derive(Debug, Clone, Copy)]
pub struct EnvelopeFields<'a> {
    pub host: &'a str,
    pub facility: &'a str,
    pub service: &'a str,
    pub version: &'a str,
    pub additional_fields: &'a Map<String, Value>,
    /// Value for `_logSequence`, when sequencing is on.
    pub sequence: Option<u64>,
}

/// Build the JSON object sent for one record.
///
/// Fixed fields win over additional fields, which win over record
/// properties.
pub fn build_envelope(record: &LogRecord, fields: &EnvelopeFields<'_>) -> Map<String, Value> {
    let level = severity(&record.group);
    let mut envelope = Map::new();

    envelope.insert("timestamp".into(), Value::from(record.unix_timestamp));
    envelope.insert("host".into(), Value::from(fields.host));
    envelope.insert("group".into(), Value::from(record.group.as_str()));
    envelope.insert("baseGroup".into(), Value::from(base_group(&record.group)));
    envelope.insert("level".into(), Value::from(level));
    envelope.insert("facility".into(), Value::from(fields.facility));
    envelope.insert("service".into(), Value::from(fields.service));
    envelope.insert("version".into(), Value::from(fields.version));

    let extra = fields.additional_fields.iter().chain(record.properties.iter());
    for (key, value) in extra {
        if !envelope.contains_key(key) {
            envelope.insert(key.clone(), value.clone());
        }
    }

    if level != LEVEL_INFO {
        if let Ok(meta) = serde_json::to_value(&record.meta) {
            envelope.insert("meta".into(), meta);
        }
    }

    if let Some(sequence) = fields.sequence {
        envelope.insert("_logSequence".into(), Value::from(sequence));
    }

    envelope.insert("short_message".into(), Value::from(record.message.as_str()));
    envelope
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Serialize and compress the envelope for `record`.
pub fn encode(record: &LogRecord, fields: &EnvelopeFields<'_>) -> Result<Vec<u8>, TransportError> {
    let json = serde_json::to_vec(&build_envelope(record, fields))?;
    compress(&json)
}
