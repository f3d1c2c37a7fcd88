use super::config::LoggerConfig;
use crate::domain::{LogArg, LogRecord, RouterError};
use crate::filter::{DisabledPolicy, EnabledPolicy, GroupFilters, GroupSpec};
use crate::transport::registry::deliver_all;
use crate::transport::{
    ConsoleSettings, ConsoleTransport, DispatchOutcome, TransportFactory, TransportRegistry,
};
use std::panic::Location;
use std::sync::Arc;
use tracing::debug;

/// Logger-wide options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoggerOptions {
    pub filters: GroupFilters,
    /// Build records even when no transport takes them.
    pub store_all_history: bool,
}

/// Routes log calls to registered transports.
///
/// A `Logger` is an ordinary value: create as many as needed and pass
/// them where they are used. Dropping a logger closes its transports.
///
/// ```no_run
/// use rask_log_router::{LogArg, Logger};
///
/// let logger = Logger::with_default_transports();
/// logger.log("api:users", "created user", [LogArg::property("id", 7)]);
/// ```
#[derive(Debug, Default)]
pub struct Logger {
    options: LoggerOptions,
    transports: TransportRegistry,
}

impl Logger {
    /// A logger with no transports.
    pub fn new(options: LoggerOptions) -> Self {
        Self {
            options,
            transports: TransportRegistry::new(),
        }
    }

    /// A logger printing to the console with meta information.
    pub fn with_default_transports() -> Self {
        let mut logger = Self::new(LoggerOptions::default());
        logger.transports.add(Arc::new(ConsoleTransport::new(ConsoleSettings {
            show_meta: true,
            show_stack_trace: false,
            ..ConsoleSettings::default()
        })));
        logger
    }

    pub fn from_config(config: &LoggerConfig) -> Result<Self, RouterError> {
        Self::from_config_with_factory(config, &TransportFactory::new())
    }

    /// Build a logger, creating transports through `factory`.
    pub fn from_config_with_factory(config: &LoggerConfig, factory: &TransportFactory) -> Result<Self, RouterError> {
        config.validate()?;

        let options = LoggerOptions {
            filters: GroupFilters::new(config.groups_enabled.clone(), config.groups_disabled.clone()),
            store_all_history: config.store_all_history,
        };

        let Some(transports) = &config.transports else {
            let mut logger = Self::with_default_transports();
            logger.options = options;
            return Ok(logger);
        };

        let mut logger = Self::new(options);
        for transport in transports {
            let created = factory.create(&transport.kind, &transport.options)?;
            let key = logger.transports.add(created);
            debug!(key = %key, kind = %transport.kind, "Configured transport");
        }
        Ok(logger)
    }

    /// Log `message` under `group`.
    ///
    /// The record is only built when some transport takes the group, or
    /// when `store_all_history` is set. Returns the record if one was built.
    #[track_caller]
    pub fn log<A>(&self, group: &str, message: impl Into<String>, args: A) -> Option<Arc<LogRecord>>
    where
        A: IntoIterator<Item = LogArg>,
    {
        let location = Location::caller();
        let filters = &self.options.filters;
        let matched = self
            .transports
            .matching(group, &filters.groups_enabled, &filters.groups_disabled);

        if matched.is_empty() && !self.options.store_all_history {
            return None;
        }

        let record = Arc::new(LogRecord::build(group, message, args, location));
        deliver_all(&matched, &record);
        Some(record)
    }

    /// Route a record built elsewhere.
    pub fn log_record(&self, record: LogRecord) -> DispatchOutcome {
        let filters = &self.options.filters;
        self.transports
            .dispatch(&Arc::new(record), &filters.groups_enabled, &filters.groups_disabled)
    }

    /// Whether a record of `group` would reach at least one transport.
    pub fn can_log(&self, group: &str) -> bool {
        let filters = &self.options.filters;
        !self
            .transports
            .matching(group, &filters.groups_enabled, &filters.groups_disabled)
            .is_empty()
    }

    /// Enable `spec`, turning a boolean policy into a list first.
    pub fn add_group(&mut self, spec: impl Into<GroupSpec>) -> &mut Self {
        let spec = spec.into();
        let mut specs = self.take_enabled_list();

        if !specs.iter().any(|existing| existing.to_string() == spec.to_string()) {
            specs.push(spec);
        }
        self.options.filters.groups_enabled = EnabledPolicy::Groups(specs);
        self
    }

    /// Remove every enabled spec with the same textual form as `spec`.
    pub fn remove_group(&mut self, spec: impl Into<GroupSpec>) -> &mut Self {
        let text = spec.into().to_string();
        let mut specs = self.take_enabled_list();

        specs.retain(|existing| existing.to_string() != text);
        self.options.filters.groups_enabled = EnabledPolicy::Groups(specs);
        self
    }

    /// A boolean policy counts as an empty list.
    fn take_enabled_list(&mut self) -> Vec<GroupSpec> {
        match std::mem::take(&mut self.options.filters.groups_enabled) {
            EnabledPolicy::Groups(specs) => specs,
            EnabledPolicy::All | EnabledPolicy::Nothing => Vec::new(),
        }
    }

    pub fn set_groups_enabled(&mut self, enabled: impl Into<EnabledPolicy>) -> &mut Self {
        self.options.filters.groups_enabled = enabled.into();
        self
    }

    pub fn set_groups_disabled(&mut self, disabled: DisabledPolicy) -> &mut Self {
        self.options.filters.groups_disabled = disabled;
        self
    }

    pub fn set_store_all_history(&mut self, store: bool) -> &mut Self {
        self.options.store_all_history = store;
        self
    }

    pub fn options(&self) -> &LoggerOptions {
        &self.options
    }

    pub fn transports(&self) -> &TransportRegistry {
        &self.transports
    }

    pub fn transports_mut(&mut self) -> &mut TransportRegistry {
        &mut self.transports
    }

    /// Close every transport.
    pub fn close(&mut self) {
        self.transports.empty();
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}
