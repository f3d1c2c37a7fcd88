//! Named, JSON-valued transport properties.
//!
//! Every transport keeps its tunable settings in a serde struct behind a
//! `PropertyBag`, which lets a `TransportSelection` read and write them by
//! key without knowing the concrete transport type.

use super::error::PropertyError;
use crate::filter::{DisabledPolicy, EnabledPolicy, GroupSpec, can_log};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GROUPS_ENABLED: &str = "groups_enabled";
pub const GROUPS_DISABLED: &str = "groups_disabled";

/// Per-transport overrides of the logger-wide group policies.
///
/// `None` means the transport follows the logger's policy.
#[derive(Debug, Default)]
pub struct FilterOverrides {
    enabled: RwLock<Option<EnabledPolicy>>,
    disabled: RwLock<Option<DisabledPolicy>>,
}

/// Serde form of the overrides, read from transport options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub groups_enabled: Option<EnabledPolicy>,
    #[serde(default)]
    pub groups_disabled: Option<DisabledPolicy>,
}

impl FilterOverrides {
    pub fn new(enabled: Option<EnabledPolicy>, disabled: Option<DisabledPolicy>) -> Self {
        Self {
            enabled: RwLock::new(enabled),
            disabled: RwLock::new(disabled),
        }
    }

    pub fn from_options(options: FilterOptions) -> Self {
        Self::new(options.groups_enabled, options.groups_disabled)
    }

    pub fn enabled(&self) -> Option<EnabledPolicy> {
        self.enabled.read().clone()
    }

    pub fn disabled(&self) -> Option<DisabledPolicy> {
        self.disabled.read().clone()
    }

    pub fn set_enabled(&self, enabled: Option<EnabledPolicy>) {
        *self.enabled.write() = enabled;
    }

    pub fn set_disabled(&self, disabled: Option<DisabledPolicy>) {
        *self.disabled.write() = disabled;
    }

    /// Apply `can_log` with the overrides falling back to the given policies.
    pub fn can_log(&self, group: &str, enabled: &EnabledPolicy, disabled: &[GroupSpec]) -> bool {
        let own_enabled = self.enabled.read();
        let own_disabled = self.disabled.read();

        can_log(
            group,
            own_enabled.as_ref().unwrap_or(enabled),
            own_disabled.as_deref().unwrap_or(disabled),
        )
    }

    pub fn is_filter_key(key: &str) -> bool {
        key == GROUPS_ENABLED || key == GROUPS_DISABLED
    }

    fn get(&self, key: &str) -> Option<Value> {
        let value = match key {
            GROUPS_ENABLED => serde_json::to_value(&*self.enabled.read()),
            GROUPS_DISABLED => serde_json::to_value(&*self.disabled.read()),
            _ => return None,
        };
        value.ok()
    }

    fn set(&self, transport: &str, key: &str, value: Value) -> Result<(), PropertyError> {
        let invalid = |e: serde_json::Error| PropertyError::Invalid {
            transport: transport.to_string(),
            key: key.to_string(),
            reason: e.to_string(),
        };

        match key {
            GROUPS_ENABLED => {
                // `null` clears the override rather than denying everything
                let enabled = if value.is_null() {
                    None
                } else {
                    Some(serde_json::from_value(value).map_err(invalid)?)
                };
                self.set_enabled(enabled);
            }
            GROUPS_DISABLED => {
                let disabled: Option<DisabledPolicy> =
                    serde_json::from_value(value).map_err(invalid)?;
                self.set_disabled(disabled);
            }
            _ => {
                return Err(PropertyError::Unknown {
                    transport: transport.to_string(),
                    key: key.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// A settings struct exposed as a flat map of named properties.
#[derive(Debug)]
pub struct PropertyBag<S> {
    settings: RwLock<S>,
}

impl<S> PropertyBag<S>
where
    S: Serialize + DeserializeOwned + Clone,
{
    pub fn new(settings: S) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, S> {
        self.settings.read()
    }

    pub fn snapshot(&self) -> S {
        self.settings.read().clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match serde_json::to_value(&*self.settings.read()) {
            Ok(Value::Object(mut map)) => map.remove(key),
            _ => None,
        }
    }

    /// Replace one field, validating the result through serde.
    pub fn set(&self, transport: &str, key: &str, value: Value) -> Result<(), PropertyError> {
        self.set_validated(transport, key, value, |_| Ok(()))
    }

    /// Like `set`, but `check` can reject the updated settings before they
    /// are stored.
    pub fn set_validated<F>(&self, transport: &str, key: &str, value: Value, check: F) -> Result<(), PropertyError>
    where
        F: FnOnce(&S) -> Result<(), String>,
    {
        let invalid = |reason: String| PropertyError::Invalid {
            transport: transport.to_string(),
            key: key.to_string(),
            reason,
        };

        let mut settings = self.settings.write();
        let mut map = match serde_json::to_value(&*settings) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(invalid("settings are not a map".to_string())),
            Err(e) => return Err(invalid(e.to_string())),
        };

        if !map.contains_key(key) {
            return Err(PropertyError::Unknown {
                transport: transport.to_string(),
                key: key.to_string(),
            });
        }

        map.insert(key.to_string(), value);
        let updated: S = serde_json::from_value(Value::Object(map)).map_err(|e| invalid(e.to_string()))?;
        check(&updated).map_err(invalid)?;

        *settings = updated;
        Ok(())
    }
}

/// Look a key up in the filter overrides first, then in the settings.
pub fn read_property<S>(filters: &FilterOverrides, bag: &PropertyBag<S>, key: &str) -> Option<Value>
where
    S: Serialize + DeserializeOwned + Clone,
{
    filters.get(key).or_else(|| bag.get(key))
}

pub fn write_property<S>(
    transport: &str,
    filters: &FilterOverrides,
    bag: &PropertyBag<S>,
    key: &str,
    value: Value,
) -> Result<(), PropertyError>
where
    S: Serialize + DeserializeOwned + Clone,
{
    if FilterOverrides::is_filter_key(key) {
        filters.set(transport, key, value)
    } else {
        bag.set(transport, key, value)
    }
}
