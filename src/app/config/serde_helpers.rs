//! Durations as integer milliseconds, plus environment override helpers.

use crate::filter::{EnabledPolicy, GroupSpec};
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// Parse `name` into `target` if it is set; an unset variable keeps the default.
pub fn load_env_var<T>(name: &str, target: &mut T) -> Result<(), super::ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value
            .trim()
            .parse()
            .map_err(|e| super::ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Comma-separated group specs; blank items are skipped.
pub fn parse_spec_list(value: &str) -> Result<Vec<GroupSpec>, regex::Error> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(GroupSpec::parse)
        .collect()
}

/// `true`, `false` or a comma-separated list of group specs.
pub fn parse_enabled_policy(value: &str) -> Result<EnabledPolicy, regex::Error> {
    match value.trim() {
        "true" | "*" => Ok(EnabledPolicy::All),
        "false" | "" => Ok(EnabledPolicy::Nothing),
        list => Ok(EnabledPolicy::Groups(parse_spec_list(list)?)),
    }
}

pub fn load_env_enabled(name: &str, target: &mut EnabledPolicy) -> Result<(), super::ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = parse_enabled_policy(&value)
            .map_err(|e| super::ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

pub fn load_env_specs(name: &str, target: &mut Vec<GroupSpec>) -> Result<(), super::ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = parse_spec_list(&value)
            .map_err(|e| super::ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enabled_policy() {
        assert_eq!(parse_enabled_policy("true").unwrap(), EnabledPolicy::All);
        assert_eq!(parse_enabled_policy(" false ").unwrap(), EnabledPolicy::Nothing);
        assert_eq!(
            parse_enabled_policy("db, /^api:/ ,").unwrap(),
            EnabledPolicy::Groups(vec![GroupSpec::literal("db"), GroupSpec::parse("/^api:/").unwrap()])
        );
        assert!(parse_enabled_policy("/[unclosed/").is_err());
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        #[serde(with = "crate::app::config::serde_helpers")]
        timeout: Duration,
    }

    #[test]
    fn test_duration_millis() {
        let wrapper: Wrapper = serde_json::from_str(r#"{"timeout": 250}"#).unwrap();
        assert_eq!(wrapper.timeout, Duration::from_millis(250));
        assert_eq!(serde_json::to_string(&wrapper).unwrap(), r#"{"timeout":250}"#);
    }
}
