//! Domain layer for rask-log-router.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord`: the finished record handed to every transport
//! - `LogArg`: explicitly tagged extra arguments supplied by producers
//! - `RouterError`: Top-level error type

pub mod error;
pub mod log_record;

pub use error::RouterError;
pub use log_record::{LogArg, LogMeta, LogRecord, Properties};
