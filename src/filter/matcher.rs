use super::group_spec::{EnabledPolicy, GroupSpec};

/// Group prefixes that stay enabled regardless of the allow-list.
pub const ALWAYS_ENABLED_PREFIXES: [&str; 2] = ["error", "warn"];

pub fn spec_matches(group: &str, spec: &GroupSpec) -> bool {
    spec.matches(group)
}

/// Decide whether a record of `group` may be logged.
///
/// The allow-list sets the base answer, `error*` and `warn*` groups are
/// forced on, and any deny-list match has the final say.
pub fn can_log(group: &str, enabled: &EnabledPolicy, disabled: &[GroupSpec]) -> bool {
    let mut allowed = enabled.matches(group);

    if ALWAYS_ENABLED_PREFIXES
        .iter()
        .any(|prefix| group.starts_with(prefix))
    {
        allowed = true;
    }

    if disabled.iter().any(|spec| spec_matches(group, spec)) {
        allowed = false;
    }

    allowed
}
