//! Persisted ring buffer of [`LogEntry`] values.

use crate::query::LogQuery;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use site_types::{
    keys, ActionLogError, Clock, KeyValueStore, LogAction, LogEntry, LogStats, SystemClock,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_MAX_LOGS: usize = 100;

#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    /// Entries kept; older ones are evicted on write.
    pub max_logs: usize,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            max_logs: DEFAULT_MAX_LOGS,
        }
    }
}

struct LogState {
    /// Newest first. `None` until first access.
    entries: Option<Vec<LogEntry>>,
    session_id: Option<String>,
    last_id: i64,
}

/// Append-only, capped action log stored under [`keys::ACTION_LOG`].
///
/// Only the most recent `max_logs` entries ever exist, so exports are not a
/// full history. The session id is minted on the first entry after start-up or
/// after [`ActionLog::clear_logs`].
pub struct ActionLog {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: ActionLogConfig,
    state: Mutex<LogState>,
}

fn new_session_id() -> String {
    format!("session_{}", Uuid::new_v4().simple())
}

fn details_map(details: Value) -> Map<String, Value> {
    match details {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("info".to_string(), other);
            map
        }
    }
}

impl ActionLog {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self::with_config(kv, Arc::new(SystemClock), ActionLogConfig::default())
    }

    pub fn with_config(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: ActionLogConfig,
    ) -> Self {
        Self {
            kv,
            clock,
            config,
            state: Mutex::new(LogState {
                entries: None,
                session_id: None,
                last_id: 0,
            }),
        }
    }

    fn load(&self) -> Vec<LogEntry> {
        match self.kv.get(keys::ACTION_LOG) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<LogEntry>>(&blob) {
                Ok(mut entries) => {
                    entries.sort_by(|a, b| b.id.cmp(&a.id));
                    entries.truncate(self.config.max_logs);
                    entries
                }
                Err(e) => {
                    tracing::warn!(error = %e, "action log is corrupt, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "action log unreadable, starting empty");
                Vec::new()
            }
        }
    }

    fn with_entries<R>(&self, f: impl FnOnce(&[LogEntry]) -> R) -> R {
        let mut guard = self.state.lock();
        if guard.entries.is_none() {
            let loaded = self.load();
            guard.last_id = loaded.iter().map(|e| e.id).max().unwrap_or(0);
            guard.entries = Some(loaded);
        }
        f(guard.entries.as_deref().unwrap_or(&[]))
    }

    fn persist(&self, entries: &[LogEntry]) -> Result<(), ActionLogError> {
        let blob = serde_json::to_string(entries)
            .map_err(|e| ActionLogError::Serialization(e.to_string()))?;
        self.kv.set(keys::ACTION_LOG, &blob)?;
        Ok(())
    }

    /// Record `action`. Non-object `details` are wrapped as `{"info": details}`.
    /// A failed write leaves the in-memory log unchanged.
    pub fn log(&self, action: LogAction, details: Value) -> Result<LogEntry, ActionLogError> {
        // Make sure the stored log is loaded before taking the lock for writing.
        self.with_entries(|_| ());
        let mut guard = self.state.lock();
        let now = self.clock.now();
        let id = now.timestamp_millis().max(guard.last_id.saturating_add(1));
        let session_id = guard
            .session_id
            .get_or_insert_with(new_session_id)
            .clone();
        let entry = LogEntry {
            id,
            timestamp: now,
            action,
            details: details_map(details),
            session_id,
        };

        let current = guard.entries.as_deref().unwrap_or(&[]);
        let mut next = Vec::with_capacity(self.config.max_logs);
        next.push(entry.clone());
        next.extend(
            current
                .iter()
                .take(self.config.max_logs.saturating_sub(1))
                .cloned(),
        );
        self.persist(&next)?;
        guard.entries = Some(next);
        guard.last_id = id;
        tracing::debug!(action = %action, id, "action logged");
        Ok(entry)
    }

    /// Newest first.
    pub fn get_logs(&self) -> Vec<LogEntry> {
        self.with_entries(|entries| entries.to_vec())
    }

    pub fn query(&self, query: &LogQuery) -> Vec<LogEntry> {
        self.with_entries(|entries| query.apply(entries))
    }

    pub fn get_logs_by_action(&self, action: LogAction) -> Vec<LogEntry> {
        self.query(&LogQuery::action(action))
    }

    /// Entries with `start <= timestamp <= end`.
    pub fn get_logs_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<LogEntry> {
        self.query(&LogQuery::between(start, end))
    }

    pub fn get_stats(&self) -> LogStats {
        let now = self.clock.now();
        let today = now.date_naive();
        let week_ago = now - Duration::days(7);
        self.with_entries(|entries| {
            let mut stats = LogStats {
                total_logs: entries.len(),
                ..LogStats::default()
            };
            let mut sessions = HashSet::new();
            for entry in entries {
                sessions.insert(entry.session_id.as_str());
                *stats.counts_by_action.entry(entry.action).or_insert(0) += 1;
                if entry.timestamp.date_naive() == today {
                    stats.today_count += 1;
                }
                if entry.timestamp >= week_ago {
                    stats.last_7_days_count += 1;
                }
            }
            stats.distinct_sessions = sessions.len();
            stats
        })
    }

    /// Empty the log and retire the current session id.
    pub fn clear_logs(&self) -> Result<(), ActionLogError> {
        let mut guard = self.state.lock();
        self.persist(&[])?;
        guard.entries = Some(Vec::new());
        guard.session_id = None;
        tracing::info!("action log cleared");
        Ok(())
    }

    /// Pretty JSON array of the retained entries, newest first.
    pub fn export_logs(&self) -> Result<String, ActionLogError> {
        self.with_entries(|entries| {
            serde_json::to_string_pretty(entries)
                .map_err(|e| ActionLogError::Serialization(e.to_string()))
        })
    }

    /// Download name for [`ActionLog::export_logs`], dated by the log's clock.
    pub fn export_file_name(&self) -> String {
        format!("admin-logs-{}.json", self.clock.now().format("%Y-%m-%d"))
    }

    /// Session id stamped on entries written from now on, if one is active.
    pub fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    pub fn max_logs(&self) -> usize {
        self.config.max_logs
    }
}
