//! Persistent Store key layout. These names are stable across versions.

/// Serialized content tree.
pub const CONTENT: &str = "websiteData";
/// Asset registry (filename -> record).
pub const ASSETS: &str = "websiteAssets";
/// Action log, newest first.
pub const ACTION_LOG: &str = "adminLogs";
/// Active admin session record.
pub const SESSION: &str = "adminSession";
/// Failed-attempt counter and lock deadline.
pub const LOCKOUT: &str = "adminLockout";
