//! The router's own diagnostics, reported through `tracing`.

use super::config::DiagnosticLevel;
use parking_lot::RwLock;
use std::sync::OnceLock;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiagnosticsError {
    #[error("Invalid directive '{directive}': {reason}")]
    InvalidDirective { directive: String, reason: String },
    #[error("Failed to initialize diagnostics: {0}")]
    InitFailed(String),
}

/// A `target=level` filter entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub target: String,
    pub level: DiagnosticLevel,
}

impl Directive {
    pub fn new(target: impl Into<String>, level: DiagnosticLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    pub fn parse(text: &str) -> Result<Self, DiagnosticsError> {
        let invalid = |reason: &str| DiagnosticsError::InvalidDirective {
            directive: text.to_string(),
            reason: reason.to_string(),
        };

        let (target, level) = text.split_once('=').ok_or_else(|| invalid("expected target=level"))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(invalid("empty target"));
        }

        let level = level.trim().parse().map_err(|e: String| invalid(&e))?;
        Ok(Self::new(target, level))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level)
    }
}

/// Builds the `EnvFilter` used for diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticsSystem {
    directives: RwLock<Vec<Directive>>,
}

impl DiagnosticsSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_directive(&self, text: &str) -> Result<(), DiagnosticsError> {
        let directive = Directive::parse(text)?;
        self.directives.write().push(directive);
        Ok(())
    }

    /// Keep runtime internals quiet unless asked for.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["tokio", "runtime", "mio"] {
            directives.push(Directive::new(target, DiagnosticLevel::Warn));
        }
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    pub fn build_filter_string(&self, default_level: DiagnosticLevel) -> String {
        let directives = self.directives.read();
        let mut parts = Vec::with_capacity(directives.len() + 1);

        parts.push(default_level.as_str().to_string());
        parts.extend(directives.iter().map(Directive::to_filter_string));
        parts.join(",")
    }

    /// Install a global fmt subscriber. Fails if one is already set.
    pub fn initialize(&self, default_level: DiagnosticLevel) -> Result<(), DiagnosticsError> {
        let filter_string = self.build_filter_string(default_level);
        let filter = EnvFilter::try_new(&filter_string)
            .map_err(|e| DiagnosticsError::InitFailed(format!("bad filter '{filter_string}': {e}")))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).compact())
            .try_init()
            .map_err(|e| DiagnosticsError::InitFailed(e.to_string()))
    }
}

/// Set up diagnostics once per process; later calls return the first result.
pub fn init_diagnostics(level: DiagnosticLevel) -> Result<(), DiagnosticsError> {
    static RESULT: OnceLock<Result<(), DiagnosticsError>> = OnceLock::new();

    RESULT
        .get_or_init(|| {
            let system = DiagnosticsSystem::new();
            system.add_default_directives();
            system.initialize(level)
        })
        .clone()
}
