//! Action log entries and aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of administrative action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogAction {
    Login,
    LoginFailed,
    Lockout,
    Logout,
    Create,
    Update,
    Delete,
    Reset,
    View,
    Export,
    Import,
    UnauthorizedAccess,
    AdminAccess,
}

impl LogAction {
    pub const ALL: [LogAction; 13] = [
        LogAction::Login,
        LogAction::LoginFailed,
        LogAction::Lockout,
        LogAction::Logout,
        LogAction::Create,
        LogAction::Update,
        LogAction::Delete,
        LogAction::Reset,
        LogAction::View,
        LogAction::Export,
        LogAction::Import,
        LogAction::UnauthorizedAccess,
        LogAction::AdminAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogAction::Login => "LOGIN",
            LogAction::LoginFailed => "LOGIN_FAILED",
            LogAction::Lockout => "LOCKOUT",
            LogAction::Logout => "LOGOUT",
            LogAction::Create => "CREATE",
            LogAction::Update => "UPDATE",
            LogAction::Delete => "DELETE",
            LogAction::Reset => "RESET",
            LogAction::View => "VIEW",
            LogAction::Export => "EXPORT",
            LogAction::Import => "IMPORT",
            LogAction::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            LogAction::AdminAccess => "ADMIN_ACCESS",
        }
    }
}

impl fmt::Display for LogAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogAction::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action: {}", s))
    }
}

/// One audit entry. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Millisecond timestamp, strictly increasing within a process.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: LogAction,
    #[serde(default)]
    pub details: serde_json::Map<String, serde_json::Value>,
    pub session_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total_logs: usize,
    pub distinct_sessions: usize,
    pub counts_by_action: BTreeMap<LogAction, usize>,
    pub today_count: usize,
    pub last_7_days_count: usize,
}
