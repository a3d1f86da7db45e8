//! Shared-credential login with a persisted failure counter and lockout.

use chrono::Duration;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use site_audit::ActionLog;
use site_types::{
    keys, AuthError, Clock, KeyValueStore, LockoutState, LogAction, Session, SystemClock,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Consecutive failures that trigger a lockout.
    pub max_attempts: u32,
    pub lockout: Duration,
    pub session_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout: Duration::minutes(15),
            session_ttl: Duration::hours(24),
        }
    }
}

/// The single admin credential.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Login gate. Counter, lock deadline and session live in the Persistent Store,
/// so they survive restarts; each read-compare-write runs under one mutex.
pub struct AuthGate {
    kv: Arc<dyn KeyValueStore>,
    log: Arc<ActionLog>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
    credentials: Credentials,
    guard: Mutex<()>,
}

impl AuthGate {
    pub fn new(kv: Arc<dyn KeyValueStore>, log: Arc<ActionLog>, credentials: Credentials) -> Self {
        Self::with_config(kv, log, Arc::new(SystemClock), AuthConfig::default(), credentials)
    }

    pub fn with_config(
        kv: Arc<dyn KeyValueStore>,
        log: Arc<ActionLog>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
        credentials: Credentials,
    ) -> Self {
        Self {
            kv,
            log,
            clock,
            config,
            credentials,
            guard: Mutex::new(()),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AuthError> {
        let Some(blob) = self.kv.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "auth record is corrupt, ignoring it");
                Ok(None)
            }
        }
    }

    fn write<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<(), AuthError> {
        let blob =
            serde_json::to_string(value).map_err(|e| AuthError::Serialization(e.to_string()))?;
        self.kv.set(key, &blob)?;
        Ok(())
    }

    /// Action-log failures never block authentication.
    fn record(&self, action: LogAction, details: Value) {
        if let Err(e) = self.log.log(action, details) {
            tracing::warn!(action = %action, error = %e, "could not record auth event");
        }
    }

    /// Check the credential. While a lock is active every attempt is refused,
    /// correct or not. The `max_attempts`-th consecutive failure starts a lock.
    pub fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let _guard = self.guard.lock();
        let now = self.clock.now();
        let mut state: LockoutState = self.read(keys::LOCKOUT)?.unwrap_or_default();

        if let Some(until) = state.lock_until.filter(|_| state.is_locked_at(now)) {
            self.record(
                LogAction::Lockout,
                json!({ "username": username, "lockUntil": until, "reason": "attempt while locked" }),
            );
            return Err(AuthError::LockedOut { until });
        }
        if state.lock_until.is_some() {
            state = LockoutState::default();
        }

        if !self.credentials.matches(username, password) {
            state.failed_attempts += 1;
            if state.failed_attempts >= self.config.max_attempts {
                let until = now + self.config.lockout;
                let attempts = state.failed_attempts;
                state = LockoutState {
                    failed_attempts: 0,
                    lock_until: Some(until),
                };
                self.write(keys::LOCKOUT, &state)?;
                tracing::warn!(username, attempts, lock_until = %until, "admin login locked out");
                self.record(
                    LogAction::Lockout,
                    json!({ "username": username, "attempts": attempts, "lockUntil": until }),
                );
                return Err(AuthError::LockedOut { until });
            }
            self.write(keys::LOCKOUT, &state)?;
            let remaining_attempts = self.config.max_attempts - state.failed_attempts;
            self.record(
                LogAction::LoginFailed,
                json!({ "username": username, "attempts": state.failed_attempts }),
            );
            return Err(AuthError::InvalidCredentials { remaining_attempts });
        }

        let session = Session {
            token: Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            login_at: now,
            expires_at: now + self.config.session_ttl,
        };
        // Clear the counter first so a stored session never sits beside a stale lock.
        self.kv.remove(keys::LOCKOUT)?;
        self.write(keys::SESSION, &session)?;
        tracing::info!(username, "admin logged in");
        self.record(
            LogAction::Login,
            json!({ "username": username, "expiresAt": session.expires_at }),
        );
        Ok(session)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        let _guard = self.guard.lock();
        let session: Option<Session> = self.read(keys::SESSION)?;
        self.kv.remove(keys::SESSION)?;
        let username = session.map(|s| s.username);
        tracing::info!(username = ?username, "admin logged out");
        self.record(LogAction::Logout, json!({ "username": username }));
        Ok(())
    }

    /// The stored session if it has not expired. An expired record is removed.
    pub fn current_session(&self) -> Result<Option<Session>, AuthError> {
        let _guard = self.guard.lock();
        let Some(session) = self.read::<Session>(keys::SESSION)? else {
            return Ok(None);
        };
        if session.is_valid_at(self.clock.now()) {
            return Ok(Some(session));
        }
        self.kv.remove(keys::SESSION)?;
        tracing::debug!(username = %session.username, "admin session expired");
        Ok(None)
    }

    /// The current session, if `token` is its bearer token.
    pub fn verify(&self, token: &str) -> Result<Option<Session>, AuthError> {
        Ok(self
            .current_session()?
            .filter(|s| !s.token.is_empty() && s.token == token))
    }

    pub fn lockout_status(&self) -> Result<LockoutState, AuthError> {
        let _guard = self.guard.lock();
        Ok(self.read(keys::LOCKOUT)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use site_audit::ActionLogConfig;
    use site_storage::{FaultyKvStore, InMemoryKvStore};
    use site_types::ManualClock;

    struct Fixture {
        kv: Arc<FaultyKvStore>,
        clock: Arc<ManualClock>,
        log: Arc<ActionLog>,
        gate: AuthGate,
    }

    fn fixture() -> Fixture {
        let kv = Arc::new(FaultyKvStore::new(Arc::new(InMemoryKvStore::new())));
        let clock = Arc::new(ManualClock::default());
        let log = Arc::new(ActionLog::with_config(
            kv.clone(),
            clock.clone(),
            ActionLogConfig::default(),
        ));
        let gate = AuthGate::with_config(
            kv.clone(),
            log.clone(),
            clock.clone(),
            AuthConfig::default(),
            Credentials::new("admin", "secret"),
        );
        Fixture {
            kv,
            clock,
            log,
            gate,
        }
    }

    #[test]
    fn login_opens_a_day_long_session_and_logout_ends_it() {
        let f = fixture();
        let session = f.gate.login("admin", "secret").unwrap();
        assert_eq!(session.expires_at - session.login_at, Duration::hours(24));
        assert_eq!(f.gate.current_session().unwrap(), Some(session.clone()));
        assert!(f.gate.verify(&session.token).unwrap().is_some());
        assert!(f.gate.verify("wrong").unwrap().is_none());

        f.gate.logout().unwrap();
        assert!(f.gate.current_session().unwrap().is_none());
        let actions: Vec<LogAction> = f.log.get_logs().iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![LogAction::Logout, LogAction::Login]);
    }

    #[test]
    fn session_expires_after_its_ttl() {
        let f = fixture();
        f.gate.login("admin", "secret").unwrap();
        f.clock.advance(Duration::hours(24));
        assert!(f.gate.current_session().unwrap().is_none());
        assert_eq!(f.kv.get(keys::SESSION).unwrap(), None);
    }

    #[test]
    fn fifth_failure_locks_out_even_the_right_password() {
        let f = fixture();
        for remaining in (1..=4).rev() {
            match f.gate.login("admin", "nope") {
                Err(AuthError::InvalidCredentials { remaining_attempts }) => {
                    assert_eq!(remaining_attempts, remaining)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
        let until = match f.gate.login("admin", "nope") {
            Err(AuthError::LockedOut { until }) => until,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(until, f.clock.now() + Duration::minutes(15));
        assert!(matches!(
            f.gate.login("admin", "secret"),
            Err(AuthError::LockedOut { .. })
        ));
        assert_eq!(f.gate.lockout_status().unwrap().lock_until, Some(until));
        assert_eq!(f.log.get_logs_by_action(LogAction::LoginFailed).len(), 4);
        assert_eq!(f.log.get_logs_by_action(LogAction::Lockout).len(), 2);

        f.clock.advance(Duration::minutes(15));
        f.gate.login("admin", "secret").unwrap();
        assert_eq!(f.gate.lockout_status().unwrap(), LockoutState::default());
    }

    #[test]
    fn success_resets_the_failure_counter() {
        let f = fixture();
        for _ in 0..4 {
            assert!(f.gate.login("admin", "nope").is_err());
        }
        f.gate.login("admin", "secret").unwrap();
        for _ in 0..4 {
            assert!(matches!(
                f.gate.login("admin", "nope"),
                Err(AuthError::InvalidCredentials { .. })
            ));
        }
    }

    #[test]
    fn counter_survives_a_restart() {
        let f = fixture();
        for _ in 0..3 {
            assert!(f.gate.login("admin", "nope").is_err());
        }
        let restarted = AuthGate::with_config(
            f.kv.clone(),
            f.log.clone(),
            f.clock.clone(),
            AuthConfig::default(),
            Credentials::new("admin", "secret"),
        );
        assert!(matches!(
            restarted.login("admin", "nope"),
            Err(AuthError::InvalidCredentials { remaining_attempts: 1 })
        ));
    }

    #[test]
    fn log_failures_do_not_block_login() {
        let kv = Arc::new(InMemoryKvStore::new());
        let broken = Arc::new(FaultyKvStore::new(Arc::new(InMemoryKvStore::new())));
        broken.set_unavailable(true);
        let log = Arc::new(ActionLog::new(broken));
        let gate = AuthGate::new(kv, log, Credentials::new("admin", "secret"));
        assert!(gate.login("admin", "secret").is_ok());
        assert!(gate.current_session().unwrap().is_some());
    }

    #[test]
    fn failed_counter_reset_refuses_login_without_storing_a_session() {
        let f = fixture();
        for _ in 0..2 {
            assert!(f.gate.login("admin", "nope").is_err());
        }
        f.kv.fail_removes(true);
        assert!(matches!(
            f.gate.login("admin", "secret"),
            Err(AuthError::Storage(_))
        ));
        f.kv.fail_removes(false);
        assert!(f.gate.current_session().unwrap().is_none());
        assert_eq!(f.gate.lockout_status().unwrap().failed_attempts, 2);
    }

    #[test]
    fn failed_session_write_leaves_no_session() {
        let f = fixture();
        f.kv.fail_nth_write(1);
        assert!(f.gate.login("admin", "secret").is_err());
        assert!(f.gate.current_session().unwrap().is_none());
        f.gate.login("admin", "secret").unwrap();
        assert!(f.gate.current_session().unwrap().is_some());
    }
}
