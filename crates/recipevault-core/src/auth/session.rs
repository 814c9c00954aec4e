//! The client's single source of truth for the authenticated user.
//!
//! `SessionStore` owns at most one `Session`. It is rehydrated from durable
//! storage with `restore`, replaced with `adopt`, and dropped with `clear`.
//! Nothing else mutates it.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthService, RequestAuthenticator};
use crate::storage::{Storage, StorageError};

use super::credential;

/// Storage key holding the raw credential
pub const CREDENTIAL_KEY: &str = "jwt_token";

/// Storage key holding the serialized session record
pub const SESSION_KEY: &str = "user";

/// An authenticated user and their bearer credential.
///
/// Serialized in the shape the login endpoint returns, which is also the
/// shape persisted under `SESSION_KEY`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Session {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub username: String,
    #[serde(rename = "fullName", alias = "displayName")]
    pub display_name: String,
    #[serde(rename = "token")]
    pub credential: String,
}

impl Session {
    /// A session needs a username and a credential to be usable
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.credential.is_empty()
    }

    /// Whether this session's credential is expired right now
    pub fn is_expired(&self) -> bool {
        credential::is_expired(&self.credential)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("credential", &"<redacted>")
            .finish()
    }
}

/// Where the store stands, as seen at the moment of asking.
/// Expiry is only ever noticed when someone looks; there is no timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AuthenticatedValid,
    AuthenticatedExpired,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(#[source] ApiError),

    #[error("Session is missing username or credential")]
    Incomplete,

    #[error("Failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

pub struct SessionStore<S> {
    storage: S,
    current: Option<Session>,
}

impl<S: Storage> SessionStore<S> {
    /// Create a store with no session. Call `restore` to load the persisted one.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: None,
        }
    }

    /// Create a store and immediately restore from storage
    pub fn restored(storage: S) -> Self {
        let mut store = Self::new(storage);
        store.restore();
        store
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The current session, if any. Not necessarily unexpired.
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Replace the in-memory session with whatever storage holds.
    ///
    /// This is structural only: an expired credential is restored as-is.
    /// Unparsable or partial records are wiped and the store ends up empty.
    /// A record whose credential key is missing or different is mid-write by
    /// another store: it reads as absent and is left alone. Never fails.
    pub fn restore(&mut self) -> Option<&Session> {
        self.current = match self.read_persisted() {
            Ok(session) => session,
            Err(StorageError::Corrupted { key, reason }) => {
                warn!(key = %key, reason = %reason, "Discarding corrupted session record");
                self.wipe_persisted();
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to read session from storage");
                None
            }
        };
        debug!(has_session = self.current.is_some(), "Session restored");
        self.current.as_ref()
    }

    fn read_persisted(&self) -> Result<Option<Session>, StorageError> {
        let record = match self.storage.get(SESSION_KEY)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let session: Session = serde_json::from_str(&record)
            .map_err(|e| corrupted(SESSION_KEY, &format!("unparsable record: {}", e)))?;

        if !session.is_complete() {
            return Err(corrupted(SESSION_KEY, "partial record"));
        }

        match self.storage.get(CREDENTIAL_KEY)? {
            Some(stored) if stored == session.credential => Ok(Some(session)),
            _ => {
                debug!(username = %session.username, "Credential key out of step with session record");
                Ok(None)
            }
        }
    }

    /// Make `session` the current one and persist it under both keys.
    ///
    /// Incomplete sessions are rejected without touching any state. If
    /// persisting fails the store is left empty rather than holding a
    /// session that the next `restore` would not find.
    pub fn adopt(&mut self, session: Session) -> Result<(), SessionError> {
        if !session.is_complete() {
            return Err(SessionError::Incomplete);
        }

        let record = serde_json::to_string(&session).map_err(|e| {
            corrupted(SESSION_KEY, &format!("session cannot be serialized: {}", e))
        })?;

        // Until the credential lands, restore reads the pair as no session
        let persisted = self
            .storage
            .set(SESSION_KEY, &record)
            .and_then(|()| self.storage.set(CREDENTIAL_KEY, &session.credential));

        if let Err(e) = persisted {
            warn!(error = %e, username = %session.username, "Failed to persist session");
            self.current = None;
            self.wipe_persisted();
            return Err(e.into());
        }

        info!(
            user_id = session.user_id,
            username = %session.username,
            expires_at = ?credential::expires_at(&session.credential),
            "Session adopted"
        );
        self.current = Some(session);
        Ok(())
    }

    /// Drop the current session and its persisted copy. Clearing an empty store is a no-op.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        if let Some(session) = self.current.take() {
            debug!(username = %session.username, "Session cleared");
        }
        self.storage.delete(SESSION_KEY)?;
        self.storage.delete(CREDENTIAL_KEY)?;
        Ok(())
    }

    /// Explicit user logout
    pub fn logout(&mut self) -> Result<(), StorageError> {
        if let Some(ref session) = self.current {
            info!(username = %session.username, "Logging out");
        }
        self.clear()
    }

    fn wipe_persisted(&self) {
        for key in [SESSION_KEY, CREDENTIAL_KEY] {
            if let Err(e) = self.storage.delete(key) {
                warn!(key, error = %e, "Failed to delete stored session entry");
            }
        }
    }

    /// True when there is no session or its credential is expired or unreadable
    pub fn is_expired(&self) -> bool {
        self.current.as_ref().map(|s| s.is_expired()).unwrap_or(true)
    }

    pub fn state(&self) -> SessionState {
        match self.current {
            None => SessionState::Unauthenticated,
            Some(ref session) if session.is_expired() => SessionState::AuthenticatedExpired,
            Some(_) => SessionState::AuthenticatedValid,
        }
    }

    /// Time left on the current credential, zero when absent or expired
    pub fn time_until_expiry(&self) -> Duration {
        self.current
            .as_ref()
            .map(|s| credential::time_until_expiry(&s.credential))
            .unwrap_or_else(Duration::zero)
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }

    /// Authenticator for outgoing requests, bound to the current session
    pub fn authenticator(&self) -> RequestAuthenticator<'_> {
        RequestAuthenticator::new(self.current.as_ref())
    }

    /// Log in through `auth` and adopt the resulting session.
    ///
    /// On an authentication failure the current session is left untouched.
    pub async fn login<A: AuthService>(
        &mut self,
        auth: &A,
        username: &str,
        password: &str,
    ) -> Result<Session, SessionError> {
        let session = match auth.login(username, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!(username, error = %e, "Login failed");
                return Err(SessionError::AuthenticationFailed(e));
            }
        };

        self.adopt(session.clone())?;
        Ok(session)
    }
}

fn corrupted(key: &str, reason: &str) -> StorageError {
    StorageError::Corrupted {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential::test_support::credential_expiring_in;
    use crate::storage::MemoryStorage;
    use std::sync::Mutex;

    fn session_with(credential: String) -> Session {
        Session {
            user_id: 42,
            username: "alice".to_string(),
            display_name: "Alice Liddell".to_string(),
            credential,
        }
    }

    fn valid_session() -> Session {
        session_with(credential_expiring_in(3600))
    }

    // -------------------------------------------------------------------------
    // Session record tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_session_record_shape() {
        let session = session_with("aaa.bbb.ccc".to_string());
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "userId": 42,
                "username": "alice",
                "fullName": "Alice Liddell",
                "token": "aaa.bbb.ccc"
            })
        );
    }

    #[test]
    fn test_session_accepts_display_name_alias() {
        let json = r#"{"userId": 1, "username": "bob", "displayName": "Bob", "token": "t"}"#;
        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.display_name, "Bob");
    }

    #[test]
    fn test_session_debug_redacts_credential() {
        let session = session_with("super.secret.token".to_string());
        let debug = format!("{:?}", session);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("super.secret.token"));
    }

    // -------------------------------------------------------------------------
    // Store lifecycle tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_new_store_is_empty() {
        let store = SessionStore::new(MemoryStorage::new());
        assert!(store.current().is_none());
        assert!(store.is_expired());
        assert_eq!(store.state(), SessionState::Unauthenticated);
    }

    #[test]
    fn test_adopt_then_restore_round_trips() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(storage.clone());
        let session = valid_session();

        store.adopt(session.clone()).unwrap();
        assert_eq!(store.restore(), Some(&session));
        assert_eq!(storage.get(CREDENTIAL_KEY).unwrap(), Some(session.credential.clone()));

        // A fresh store over the same storage sees it too
        let other = SessionStore::restored(storage);
        assert_eq!(other.current(), Some(&session));
    }

    #[test]
    fn test_adopt_replaces_previous_session() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(storage.clone());
        store.adopt(valid_session()).unwrap();

        let mut second = valid_session();
        second.user_id = 7;
        second.username = "bob".to_string();
        second.credential = credential_expiring_in(7200);
        store.adopt(second.clone()).unwrap();

        assert_eq!(store.restore(), Some(&second));
        assert_eq!(storage.get(CREDENTIAL_KEY).unwrap(), Some(second.credential));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(storage.clone());
        store.adopt(valid_session()).unwrap();

        store.clear().unwrap();
        assert!(store.current().is_none());
        assert!(storage.is_empty());

        store.clear().unwrap();
        assert!(store.current().is_none());
        assert!(storage.is_empty());
        assert!(store.is_expired());
        assert!(store.restore().is_none());
    }

    #[test]
    fn test_is_expired_tracks_credential() {
        let mut store = SessionStore::new(MemoryStorage::new());

        store.adopt(valid_session()).unwrap();
        assert!(!store.is_expired());
        assert_eq!(store.state(), SessionState::AuthenticatedValid);

        store.adopt(session_with(credential_expiring_in(-10))).unwrap();
        assert!(store.is_expired());
        assert_eq!(store.state(), SessionState::AuthenticatedExpired);

        store.adopt(session_with("malformed".to_string())).unwrap();
        assert!(store.is_expired());
    }

    #[test]
    fn test_restore_keeps_expired_session() {
        // Restoring is not a trust decision
        let storage = MemoryStorage::new();
        let expired = session_with(credential_expiring_in(-10));
        SessionStore::new(storage.clone()).adopt(expired.clone()).unwrap();

        let mut store = SessionStore::new(storage);
        assert_eq!(store.restore(), Some(&expired));
        assert!(store.is_expired());
    }

    // -------------------------------------------------------------------------
    // Corrupted storage tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_restore_discards_invalid_json() {
        let storage = MemoryStorage::new();
        storage.set(SESSION_KEY, "{not json").unwrap();
        storage.set(CREDENTIAL_KEY, "aaa.bbb.ccc").unwrap();

        let mut store = SessionStore::new(storage.clone());
        assert!(store.restore().is_none());
        assert_eq!(storage.get(SESSION_KEY).unwrap(), None);
        assert_eq!(storage.get(CREDENTIAL_KEY).unwrap(), None);
    }

    #[test]
    fn test_restore_discards_partial_record() {
        let storage = MemoryStorage::new();
        storage.set(SESSION_KEY, r#"{"userId": 1, "username": "alice"}"#).unwrap();

        let mut store = SessionStore::new(storage.clone());
        assert!(store.restore().is_none());
        assert!(storage.is_empty());

        // Present but empty fields are partial too
        storage
            .set(SESSION_KEY, r#"{"userId": 1, "username": "", "fullName": "", "token": "t"}"#)
            .unwrap();
        storage.set(CREDENTIAL_KEY, "t").unwrap();
        assert!(store.restore().is_none());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_restore_leaves_out_of_step_keys_alone() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(storage.clone());
        let session = valid_session();
        store.adopt(session.clone()).unwrap();

        // Credential from another write not yet matched by its record
        storage.set(CREDENTIAL_KEY, "someone.elses.token").unwrap();
        assert!(store.restore().is_none());
        assert_eq!(storage.len(), 2);

        // Record without credential
        storage.delete(CREDENTIAL_KEY).unwrap();
        assert!(store.restore().is_none());
        assert!(storage.get(SESSION_KEY).unwrap().is_some());

        // Once the credential lands the session is back
        storage.set(CREDENTIAL_KEY, &session.credential).unwrap();
        assert_eq!(store.restore(), Some(&session));

        // Credential without record
        storage.delete(SESSION_KEY).unwrap();
        assert!(store.restore().is_none());
        assert_eq!(storage.get(CREDENTIAL_KEY).unwrap(), Some(session.credential));
    }

    /// Storage that lets another store restore right before the credential is written
    struct InterleavingStorage {
        inner: MemoryStorage,
        seen_mid_write: Mutex<Vec<Option<Session>>>,
    }

    impl Storage for InterleavingStorage {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == CREDENTIAL_KEY {
                let mut other = SessionStore::new(self.inner.clone());
                let seen = other.restore().cloned();
                self.seen_mid_write.lock().unwrap().push(seen);
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StorageError> {
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_restore_during_adopt_does_not_lose_login() {
        let shared = MemoryStorage::new();
        let interleaving = InterleavingStorage {
            inner: shared.clone(),
            seen_mid_write: Mutex::new(Vec::new()),
        };

        let first = valid_session();
        let mut second = valid_session();
        second.username = "bob".to_string();
        second.credential = credential_expiring_in(7200);

        let mut store = SessionStore::new(&interleaving);
        store.adopt(first.clone()).unwrap();
        store.adopt(second.clone()).unwrap();

        // Mid-write readers saw no session, never a mix of the two
        let seen = interleaving.seen_mid_write.lock().unwrap().clone();
        assert_eq!(seen, vec![None, None]);

        assert_eq!(shared.len(), 2);
        assert_eq!(SessionStore::restored(shared).current(), Some(&second));
    }

    #[test]
    fn test_adopt_rejects_incomplete_session() {
        let storage = MemoryStorage::new();
        let mut store = SessionStore::new(storage.clone());
        let existing = valid_session();
        store.adopt(existing.clone()).unwrap();

        let mut no_username = valid_session();
        no_username.username = String::new();
        assert!(matches!(store.adopt(no_username), Err(SessionError::Incomplete)));

        let no_credential = session_with(String::new());
        assert!(matches!(store.adopt(no_credential), Err(SessionError::Incomplete)));

        // Previous session untouched in memory and in storage
        assert_eq!(store.current(), Some(&existing));
        assert_eq!(store.restore(), Some(&existing));
    }

    #[test]
    fn test_restore_reflects_other_store_clearing() {
        let storage = MemoryStorage::new();
        let mut first = SessionStore::new(storage.clone());
        let mut second = SessionStore::new(storage);

        first.adopt(valid_session()).unwrap();
        assert!(second.restore().is_some());

        first.logout().unwrap();
        // Second only notices on its next restore
        assert!(second.current().is_some());
        assert!(second.restore().is_none());
    }

    // -------------------------------------------------------------------------
    // Expiry display tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_minutes_until_expiry() {
        let mut store = SessionStore::new(MemoryStorage::new());
        assert_eq!(store.minutes_until_expiry(), 0);

        store.adopt(session_with(credential_expiring_in(-600))).unwrap();
        assert_eq!(store.minutes_until_expiry(), 0);

        store.adopt(session_with(credential_expiring_in(30 * 60 + 30))).unwrap();
        assert_eq!(store.minutes_until_expiry(), 30);
    }
}
