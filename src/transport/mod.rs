//! Log transports and the registry that routes records to them.
//!
//! A transport is any destination a `LogRecord` can be delivered to:
//! the console, a file, an in-memory history or a remote collector.
//! Each transport may narrow or widen the logger-wide group policies
//! through its own `FilterOverrides`.

pub mod console;
pub mod console_json;
pub mod error;
pub mod factory;
pub mod file;
pub mod history;
pub mod properties;
pub mod registry;

pub use console::{ConsoleSettings, ConsoleTransport};
pub use console_json::{ConsoleJsonSettings, ConsoleJsonTransport};
pub use error::{PropertyError, TransportError};
pub use factory::{TransportConstructor, TransportFactory};
pub use file::{FileSettings, FileTransport};
pub use history::{HistorySettings, HistoryTransport};
pub use properties::{FilterOptions, FilterOverrides, PropertyBag};
pub use registry::{DispatchOutcome, TransportRegistry, TransportSelection};

use crate::domain::LogRecord;
use crate::filter::{EnabledPolicy, GroupSpec};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A destination for log records.
///
/// `deliver` must not block on disk or network; transports that do I/O
/// hand the work to a tokio task or a buffered writer.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Base name used to derive the registry key ("Console", "File", ...).
    fn name(&self) -> &str;

    fn filters(&self) -> &FilterOverrides;

    fn deliver(&self, record: &Arc<LogRecord>) -> Result<(), TransportError>;

    /// Current value of a named property, `None` if the key is unknown.
    fn property(&self, key: &str) -> Option<Value>;

    fn set_property(&self, key: &str, value: Value) -> Result<(), PropertyError>;

    /// Release timers, sockets and pending writes.
    fn close(&self) {}

    /// Whether this transport takes records of `group` given the global policies.
    fn accepts(&self, group: &str, enabled: &EnabledPolicy, disabled: &[GroupSpec]) -> bool {
        self.filters().can_log(group, enabled, disabled)
    }
}
