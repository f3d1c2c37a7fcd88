use super::error::{PropertyError, TransportError};
use super::properties::{FilterOptions, FilterOverrides, PropertyBag, read_property, write_property};
use super::Transport;
use crate::domain::LogRecord;
use crate::filter::EnabledPolicy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub const HISTORY_NAME: &str = "History";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Records kept per group; 0 keeps everything.
    pub history_size: usize,
    /// Keep records of every group regardless of the logger's policies.
    pub store_everything: bool,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            history_size: 200,
            store_everything: false,
        }
    }
}

/// Keeps the most recent records of each group in memory.
#[derive(Debug)]
pub struct HistoryTransport {
    filters: FilterOverrides,
    settings: PropertyBag<HistorySettings>,
    history: Mutex<HashMap<String, VecDeque<Arc<LogRecord>>>>,
}

impl HistoryTransport {
    pub fn new(settings: HistorySettings) -> Self {
        Self::with_filters(settings, FilterOverrides::default())
    }

    pub fn with_filters(settings: HistorySettings, filters: FilterOverrides) -> Self {
        if settings.store_everything {
            filters.set_enabled(Some(EnabledPolicy::All));
        }

        Self {
            filters,
            settings: PropertyBag::new(settings),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_options(options: &Map<String, Value>) -> Result<Self, TransportError> {
        let value = Value::Object(options.clone());
        let filters: FilterOptions = serde_json::from_value(value.clone())
            .map_err(|e| TransportError::Configuration(format!("history filters: {e}")))?;
        let settings: HistorySettings = serde_json::from_value(value)
            .map_err(|e| TransportError::Configuration(format!("history options: {e}")))?;

        Ok(Self::with_filters(settings, FilterOverrides::from_options(filters)))
    }

    /// Stored records of one group, oldest first.
    pub fn history(&self, group: &str) -> Vec<Arc<LogRecord>> {
        self.history
            .lock()
            .get(group)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.history.lock().keys().cloned().collect();
        groups.sort();
        groups
    }

    pub fn clear(&self) {
        self.history.lock().clear();
    }
}

impl Default for HistoryTransport {
    fn default() -> Self {
        Self::new(HistorySettings::default())
    }
}

impl Transport for HistoryTransport {
    fn name(&self) -> &str {
        HISTORY_NAME
    }

    fn filters(&self) -> &FilterOverrides {
        &self.filters
    }

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError> {
        let limit = self.settings.read().history_size;
        let mut history = self.history.lock();
        let records = history.entry(record.group.clone()).or_default();

        records.push_back(record.clone());
        if limit > 0 {
            while records.len() > limit {
                records.pop_front();
            }
        }
        Ok(())
    }

    fn property(&self, key: &str) -> Option<Value> {
        read_property(&self.filters, &self.settings, key)
    }

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError> {
        write_property(HISTORY_NAME, &self.filters, &self.settings, key, value)?;

        if key == "store_everything" && self.settings.read().store_everything {
            self.filters.set_enabled(Some(EnabledPolicy::All));
        }
        Ok(())
    }

    fn close(&self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deliver(transport: &HistoryTransport, group: &str, message: &str) {
        transport
            .deliver(&Arc::new(LogRecord::new(group, message)))
            .unwrap();
    }

    #[test]
    fn test_keeps_records_per_group() {
        let transport = HistoryTransport::default();
        deliver(&transport, "a", "1");
        deliver(&transport, "b", "2");
        deliver(&transport, "a", "3");

        let messages: Vec<_> = transport.history("a").iter().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["1", "3"]);
        assert_eq!(transport.groups(), vec!["a", "b"]);
        assert!(transport.history("missing").is_empty());
    }

    #[test]
    fn test_evicts_oldest_past_limit() {
        let transport = HistoryTransport::new(HistorySettings {
            history_size: 2,
            store_everything: false,
        });
        for i in 0..5 {
            deliver(&transport, "a", &i.to_string());
        }

        let messages: Vec<_> = transport.history("a").iter().map(|r| r.message.clone()).collect();
        assert_eq!(messages, vec!["3", "4"]);
    }

    #[test]
    fn test_zero_size_is_unbounded() {
        let transport = HistoryTransport::new(HistorySettings {
            history_size: 0,
            store_everything: false,
        });
        for i in 0..300 {
            deliver(&transport, "a", &i.to_string());
        }
        assert_eq!(transport.history("a").len(), 300);
    }

    #[test]
    fn test_store_everything_overrides_global_policy() {
        let transport = HistoryTransport::from_options(
            json!({ "store_everything": true }).as_object().unwrap(),
        )
        .unwrap();

        assert!(transport.accepts("debug:anything", &EnabledPolicy::Nothing, &[]));
        assert_eq!(transport.property("groups_enabled"), Some(json!(true)));
    }
}
