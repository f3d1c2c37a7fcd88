use super::error::PropertyError;
use super::Transport;
use crate::domain::LogRecord;
use crate::filter::{EnabledPolicy, GroupSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of routing one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Keys of the transports whose policy accepted the group.
    pub matched: Vec<String>,
    /// Keys of the transports that returned an error from `deliver`.
    pub failed: Vec<String>,
}

impl DispatchOutcome {
    pub fn delivered(&self) -> usize {
        self.matched.len() - self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Registered transports, keyed and kept in registration order.
#[derive(Debug, Default)]
pub struct TransportRegistry {
    entries: Vec<(String, Arc<dyn Transport>)>,
    counters: HashMap<String, usize>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transport and return the key it was stored under.
    ///
    /// The first transport named `File` is keyed `File`, the next `File1`,
    /// then `File2` and so on. A key that is already taken is skipped.
    pub fn add(&mut self, transport: Arc<dyn Transport>) -> String {
        let base = transport.name().to_string();
        let entries = &self.entries;
        let taken = |key: &str| entries.iter().any(|(k, _)| k == key);

        let count = self.counters.entry(base.clone()).or_insert(0);
        let mut key = if *count == 0 {
            base.clone()
        } else {
            format!("{base}{count}")
        };
        while taken(&key) {
            *count += 1;
            key = format!("{base}{count}");
        }
        *count += 1;

        debug!(key = %key, "Registered transport");
        self.entries.push((key.clone(), transport));
        key
    }

    /// Every transport whose key contains `pattern`, ignoring case.
    pub fn get(&self, pattern: &str) -> TransportSelection {
        let needle = pattern.to_lowercase();

        TransportSelection {
            members: self
                .entries
                .iter()
                .filter(|(key, _)| key.to_lowercase().contains(&needle))
                .cloned()
                .collect(),
        }
    }

    pub fn get_key(&self, key: &str) -> Option<Arc<dyn Transport>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, transport)| transport.clone())
    }

    /// Remove transports by name and close them.
    ///
    /// With an index only the exact key `name + index` goes; without one,
    /// every key containing `name` does. Returns the removed keys.
    pub fn remove(&mut self, name: &str, index: Option<usize>) -> Vec<String> {
        let exact = index.map(|i| format!("{name}{i}"));
        let mut removed = Vec::new();

        self.entries.retain(|(key, transport)| {
            let hit = match &exact {
                Some(exact) => key == exact,
                None => key.contains(name),
            };
            if hit {
                transport.close();
                removed.push(key.clone());
            }
            !hit
        });

        if !removed.is_empty() {
            debug!(?removed, "Removed transports");
        }
        removed
    }

    pub fn remove_transport(&mut self, transport: &dyn Transport, index: Option<usize>) -> Vec<String> {
        let name = transport.name().to_string();
        self.remove(&name, index)
    }

    /// Close and drop every transport.
    pub fn empty(&mut self) {
        for (_, transport) in self.entries.drain(..) {
            transport.close();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    /// Transports that accept `group`, each checked against its own overrides
    /// before falling back to the given policies.
    pub fn matching(
        &self,
        group: &str,
        enabled: &EnabledPolicy,
        disabled: &[GroupSpec],
    ) -> Vec<(String, Arc<dyn Transport>)> {
        self.entries
            .iter()
            .filter(|(_, transport)| transport.accepts(group, enabled, disabled))
            .cloned()
            .collect()
    }

    /// Route a finished record to every matching transport.
    ///
    /// A failing transport is reported and skipped; the rest still receive
    /// the record.
    pub fn dispatch(
        &self,
        record: &Arc<LogRecord>,
        enabled: &EnabledPolicy,
        disabled: &[GroupSpec],
    ) -> DispatchOutcome {
        let matched = self.matching(&record.group, enabled, disabled);
        deliver_all(&matched, record)
    }
}

/// Deliver `record` to each transport in order.
pub(crate) fn deliver_all(
    transports: &[(String, Arc<dyn Transport>)],
    record: &Arc<LogRecord>,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();

    for (key, transport) in transports {
        outcome.matched.push(key.clone());

        if let Err(e) = transport.deliver(record) {
            warn!(
                transport = %key,
                group = %record.group,
                error = %e,
                "Transport failed to deliver record"
            );
            outcome.failed.push(key.clone());
        }
    }

    outcome
}

/// A set of transports returned by `TransportRegistry::get`.
///
/// Property reads return one value per member; writes apply to all of
/// them.
#[derive(Debug, Clone, Default)]
pub struct TransportSelection {
    members: Vec<(String, Arc<dyn Transport>)>,
}

impl TransportSelection {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.members.iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn transports(&self) -> impl Iterator<Item = &Arc<dyn Transport>> {
        self.members.iter().map(|(_, transport)| transport)
    }

    pub fn get_property(&self, key: &str) -> Vec<Option<Value>> {
        self.members
            .iter()
            .map(|(_, transport)| transport.property(key))
            .collect()
    }

    /// Set one property on every member.
    ///
    /// Every member is attempted; the first error is returned.
    pub fn set_property(&self, key: &str, value: Value) -> Result<&Self, PropertyError> {
        let mut first_error = None;

        for (name, transport) in &self.members {
            if let Err(e) = transport.set_property(key, value.clone()) {
                warn!(transport = %name, key, error = %e, "Failed to set transport property");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }

    pub fn set_properties(&self, properties: &Map<String, Value>) -> Result<&Self, PropertyError> {
        let mut first_error = None;

        for (key, value) in properties {
            if let Err(e) = self.set_property(key, value.clone()) {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}
