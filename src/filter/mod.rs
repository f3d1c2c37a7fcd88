//! Group filtering.
//!
//! Groups are colon-delimited labels such as `service:module:detail`.
//! Whether a record is delivered is decided by an allow-list
//! (`EnabledPolicy`) and a deny-list (`DisabledPolicy`).

pub mod group_spec;
pub mod matcher;

pub use group_spec::{DisabledPolicy, EnabledPolicy, GroupSpec};
pub use matcher::{ALWAYS_ENABLED_PREFIXES, can_log, spec_matches};

use serde::{Deserialize, Serialize};

/// A pair of allow/deny policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFilters {
    #[serde(default)]
    pub groups_enabled: EnabledPolicy,
    #[serde(default)]
    pub groups_disabled: DisabledPolicy,
}

impl GroupFilters {
    pub fn new(groups_enabled: EnabledPolicy, groups_disabled: DisabledPolicy) -> Self {
        Self {
            groups_enabled,
            groups_disabled,
        }
    }

    pub fn can_log(&self, group: &str) -> bool {
        can_log(group, &self.groups_enabled, &self.groups_disabled)
    }
}
