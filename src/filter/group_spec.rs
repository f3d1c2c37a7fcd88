use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One entry of an enabled or disabled group list.
///
/// A literal matches groups that start with it; a pattern matches groups
/// it finds anywhere in. The textual form `/pattern/` denotes a pattern,
/// anything else is a literal.
#[derive(Debug, Clone)]
pub enum GroupSpec {
    Literal(String),
    Pattern(Regex),
}

impl GroupSpec {
    pub fn literal(prefix: impl Into<String>) -> Self {
        Self::Literal(prefix.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self::Pattern)
    }

    /// Parse the textual form used by configuration files.
    pub fn parse(text: &str) -> Result<Self, regex::Error> {
        match text
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('/'))
        {
            Some(pattern) => Self::pattern(pattern),
            None => Ok(Self::literal(text)),
        }
    }

    pub fn matches(&self, group: &str) -> bool {
        match self {
            Self::Literal(prefix) => group.starts_with(prefix.as_str()),
            Self::Pattern(regex) => regex.is_match(group),
        }
    }
}

impl fmt::Display for GroupSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(prefix) => f.write_str(prefix),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

// Regex has no structural equality; two specs are equal when they print alike.
impl PartialEq for GroupSpec {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl From<&str> for GroupSpec {
    fn from(prefix: &str) -> Self {
        Self::literal(prefix)
    }
}

impl From<String> for GroupSpec {
    fn from(prefix: String) -> Self {
        Self::Literal(prefix)
    }
}

impl From<Regex> for GroupSpec {
    fn from(regex: Regex) -> Self {
        Self::Pattern(regex)
    }
}

impl FromStr for GroupSpec {
    type Err = regex::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for GroupSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GroupSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}

/// Allow-list policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnabledPolicy {
    /// Every group is enabled.
    #[default]
    All,
    /// No group is enabled (`false` or `null`).
    Nothing,
    /// Groups matching at least one spec are enabled.
    Groups(Vec<GroupSpec>),
}

impl EnabledPolicy {
    pub fn matches(&self, group: &str) -> bool {
        match self {
            Self::All => true,
            Self::Nothing => false,
            Self::Groups(specs) => specs.iter().any(|spec| spec.matches(group)),
        }
    }
}

impl From<bool> for EnabledPolicy {
    fn from(enabled: bool) -> Self {
        if enabled { Self::All } else { Self::Nothing }
    }
}

impl From<Vec<GroupSpec>> for EnabledPolicy {
    fn from(specs: Vec<GroupSpec>) -> Self {
        Self::Groups(specs)
    }
}

impl Serialize for EnabledPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_bool(true),
            Self::Nothing => serializer.serialize_bool(false),
            Self::Groups(specs) => specs.serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnabledRepr {
    Flag(bool),
    Groups(Vec<GroupSpec>),
}

impl<'de> Deserialize<'de> for EnabledPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<EnabledRepr>::deserialize(deserializer)? {
            None => Self::Nothing,
            Some(EnabledRepr::Flag(flag)) => Self::from(flag),
            Some(EnabledRepr::Groups(specs)) => Self::Groups(specs),
        })
    }
}

/// Deny-list policy; a match always wins over the allow-list.
pub type DisabledPolicy = Vec<GroupSpec>;
