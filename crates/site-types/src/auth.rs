//! Records written by the authentication gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active admin session, stored under [`crate::keys::SESSION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token handed to the admin client; empty for records written
    /// before tokens were issued, which then never authenticate a request.
    #[serde(default)]
    pub token: String,
    pub username: String,
    pub login_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Failure counter and lock deadline, stored under [`crate::keys::LOCKOUT`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockoutState {
    pub failed_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.lock_until.map(|until| now < until).unwrap_or(false)
    }
}
