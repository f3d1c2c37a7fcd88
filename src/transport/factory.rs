use super::console::ConsoleTransport;
use super::console_json::ConsoleJsonTransport;
use super::error::TransportError;
use super::file::FileTransport;
use super::history::HistoryTransport;
use super::Transport;
use crate::sender::GraylogTransport;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a transport from its option table.
pub type TransportConstructor = fn(&Map<String, Value>) -> Result<Arc<dyn Transport>, TransportError>;

/// Maps transport type identifiers to constructors.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    constructors: HashMap<String, TransportConstructor>,
}

impl Default for TransportFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        factory.register("console", |options| {
            Ok(Arc::new(ConsoleTransport::from_options(options)?))
        });
        factory.register("console_json", |options| {
            Ok(Arc::new(ConsoleJsonTransport::from_options(options)?))
        });
        factory.register("file", |options| {
            Ok(Arc::new(FileTransport::from_options(options)?))
        });
        factory.register("history", |options| {
            Ok(Arc::new(HistoryTransport::from_options(options)?))
        });
        factory.register("graylog", |options| {
            Ok(Arc::new(GraylogTransport::from_options(options)?))
        });
        factory
    }
}

impl TransportFactory {
    /// A factory with the built-in transports.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Identifiers are matched case-insensitively.
    pub fn register(&mut self, kind: &str, constructor: TransportConstructor) {
        self.constructors.insert(kind.to_lowercase(), constructor);
    }

    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.constructors.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn create(&self, kind: &str, options: &Map<String, Value>) -> Result<Arc<dyn Transport>, TransportError> {
        let constructor = self
            .constructors
            .get(&kind.to_lowercase())
            .ok_or_else(|| TransportError::Configuration(format!("unknown transport type '{kind}'")))?;

        constructor(options)
    }
}
