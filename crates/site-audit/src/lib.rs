//! Action log: capped, newest-first audit trail persisted next to the content.

mod action_log;
mod query;

pub use action_log::{ActionLog, ActionLogConfig, DEFAULT_MAX_LOGS};
pub use query::LogQuery;
pub use site_types::{ActionLogError, LogAction, LogEntry, LogStats};
