use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::auth::credentials::{CredentialRecord, CredentialStore};
use crate::auth::password::{self, CredentialHasher, PasswordCheck, MIN_PASSWORD_LENGTH};
use crate::error::AuthError;

/// Which identity, if any, is logged in for this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated(String),
}

impl Session {
    pub fn username(&self) -> Option<&str> {
        match self {
            Session::Anonymous => None,
            Session::Authenticated(username) => Some(username),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated(_))
    }
}

/// Read-only view of an account for display. Never carries the hash.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration, login/logout and password changes over a [`CredentialStore`].
///
/// Every failed operation leaves both the session and the in-memory store as
/// they were. A failed save rolls back the mutation that preceded it.
pub struct SessionManager {
    store: CredentialStore,
    hasher: CredentialHasher,
    min_password_length: usize,
    session: Session,
}

impl SessionManager {
    pub fn new(store: CredentialStore, hasher: CredentialHasher) -> Self {
        Self {
            store,
            hasher,
            min_password_length: MIN_PASSWORD_LENGTH,
            session: Session::Anonymous,
        }
    }

    pub fn with_min_password_length(mut self, min_password_length: usize) -> Self {
        self.min_password_length = min_password_length;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn current_user(&self) -> Option<&str> {
        self.session.username()
    }

    pub fn account(&self, username: &str) -> Option<AccountInfo> {
        self.store.get(username).map(|record| AccountInfo {
            username: username.to_string(),
            email: record.email.clone(),
            created_at: record.created_at,
            last_login: record.last_login,
        })
    }

    /// Create an account. Does not log in.
    pub fn register(
        &mut self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<(), AuthError> {
        if username.is_empty() {
            return Err(AuthError::EmptyUsername);
        }
        if self.store.contains(username) {
            return Err(AuthError::DuplicateUser(username.to_string()));
        }
        password::check_strength(password, self.min_password_length)?;

        let hash = self.hasher.hash(password)?;
        let email = email.filter(|e| !e.is_empty()).map(str::to_string);
        self.store
            .insert(username.to_string(), CredentialRecord::new(hash, email));

        if let Err(e) = self.store.save() {
            self.store.remove(username);
            return Err(e.into());
        }

        info!(username = %username, "User registered");
        Ok(())
    }

    /// Authenticate and make `username` the current identity.
    ///
    /// Logging in while someone else is logged in switches identity.
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), AuthError> {
        let check = self.verify_credentials(username, password)?;
        self.record_login(username, password, check)?;

        if let Some(previous) = self.session.username().filter(|p| *p != username) {
            info!(previous = %previous, username = %username, "Switching user");
        }
        self.session = Session::Authenticated(username.to_string());
        info!(username = %username, "Login successful");
        Ok(())
    }

    /// Forget the current identity. Safe to call when nobody is logged in.
    pub fn logout(&mut self) {
        if let Some(username) = self.session.username() {
            info!(username = %username, "Logged out");
        }
        self.session = Session::Anonymous;
    }

    /// Replace the password after checking the old one.
    ///
    /// Fails exactly like [`login`](Self::login) when the old password is
    /// wrong. Does not record a login or change the session.
    pub fn change_password(
        &mut self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.verify_credentials(username, old_password)?;
        password::check_strength(new_password, self.min_password_length)?;

        let hash = self.hasher.hash(new_password)?;
        let record = self
            .store
            .get_mut(username)
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;
        let previous = std::mem::replace(&mut record.password_hash, hash);

        if let Err(e) = self.store.save() {
            if let Some(record) = self.store.get_mut(username) {
                record.password_hash = previous;
            }
            return Err(e.into());
        }

        info!(username = %username, "Password changed");
        Ok(())
    }

    /// Check a username/password pair without side effects.
    fn verify_credentials(&self, username: &str, password: &str) -> Result<PasswordCheck, AuthError> {
        let record = self
            .store
            .get(username)
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;

        let check = self.hasher.verify(password, &record.password_hash);
        if !check.is_valid() {
            warn!(username = %username, "Rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(check)
    }

    /// Stamp `last_login`, upgrade a stale hash, and persist.
    fn record_login(
        &mut self,
        username: &str,
        password: &str,
        check: PasswordCheck,
    ) -> Result<(), AuthError> {
        let rehashed = match check {
            PasswordCheck::ValidNeedsRehash => Some(self.hasher.hash(password)?),
            _ => None,
        };

        let record = self
            .store
            .get_mut(username)
            .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;
        let previous = record.clone();
        record.last_login = Some(Utc::now());
        if let Some(hash) = rehashed {
            record.password_hash = hash;
            info!(username = %username, "Upgraded stored password hash");
        }

        if let Err(e) = self.store.save() {
            self.store.insert(username.to_string(), previous);
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{legacy_digest, test_hasher};
    use std::fs;
    use std::path::Path;

    fn manager(dir: &Path) -> SessionManager {
        SessionManager::new(CredentialStore::open(dir.join("users.json")), test_hasher())
    }

    #[test]
    fn test_register_then_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());

        sessions.register("alice", "pass1", None).unwrap();
        assert_eq!(sessions.current_user(), None);

        sessions.login("alice", "pass1").unwrap();
        assert_eq!(sessions.current_user(), Some("alice"));
        assert!(sessions.session().is_authenticated());
    }

    #[test]
    fn test_register_duplicate_leaves_record_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());

        sessions.register("alice", "pass1", Some("a@example.com")).unwrap();
        let before = sessions.store().get("alice").cloned();

        // Duplicate is checked before password strength
        let err = sessions.register("alice", "x", None).unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser(ref u) if u == "alice"));
        let err = sessions.register("alice", "another", None).unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser(_)));

        assert_eq!(sessions.store().get("alice").cloned(), before);
        sessions.login("alice", "pass1").unwrap();
    }

    #[test]
    fn test_register_weak_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());

        for (user, pass) in [("bob", ""), ("carol", "a"), ("dave", "abc")] {
            let err = sessions.register(user, pass, None).unwrap_err();
            assert!(matches!(err, AuthError::WeakPassword { min: 4 }));
            assert!(!sessions.store().contains(user));
        }
        sessions.register("erin", "abcd", None).unwrap();
    }

    #[test]
    fn test_register_empty_username() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        assert!(matches!(
            sessions.register("", "pass1", None),
            Err(AuthError::EmptyUsername)
        ));
        assert!(sessions.store().is_empty());
    }

    #[test]
    fn test_empty_username_checked_before_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        assert!(matches!(
            sessions.register("", "ab", None),
            Err(AuthError::EmptyUsername)
        ));
        // Any non-empty username gets the strength error
        for user in ["a", " ", "Alice"] {
            assert!(matches!(
                sessions.register(user, "ab", None),
                Err(AuthError::WeakPassword { min: 4 })
            ));
        }
    }

    #[test]
    fn test_register_sets_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", Some("")).unwrap();

        let info = sessions.account("alice").unwrap();
        assert_eq!(info.email, None);
        assert_eq!(info.last_login, None);
        assert!(info.created_at <= Utc::now());
    }

    #[test]
    fn test_custom_min_password_length() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path()).with_min_password_length(8);
        assert!(matches!(
            sessions.register("alice", "short", None),
            Err(AuthError::WeakPassword { min: 8 })
        ));
    }

    #[test]
    fn test_login_failures_keep_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();

        assert!(matches!(
            sessions.login("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(sessions.current_user(), None);

        sessions.login("alice", "pass1").unwrap();
        assert!(matches!(
            sessions.login("nobody", "pass1"),
            Err(AuthError::UserNotFound(_))
        ));
        assert!(matches!(
            sessions.login("alice", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        assert_eq!(sessions.current_user(), Some("alice"));
    }

    #[test]
    fn test_login_updates_last_login() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();
        let created = sessions.account("alice").unwrap().created_at;

        sessions.login("alice", "pass1").unwrap();
        let info = sessions.account("alice").unwrap();
        assert!(info.last_login.is_some());
        assert_eq!(info.created_at, created);

        let reopened = CredentialStore::open(dir.path().join("users.json"));
        assert_eq!(reopened.get("alice").unwrap().last_login(), info.last_login);
    }

    #[test]
    fn test_relogin_switches_identity() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();
        sessions.register("bob", "pass2", None).unwrap();

        sessions.login("alice", "pass1").unwrap();
        sessions.login("bob", "pass2").unwrap();
        assert_eq!(sessions.current_user(), Some("bob"));
    }

    #[test]
    fn test_logout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();
        sessions.login("alice", "pass1").unwrap();

        sessions.logout();
        assert_eq!(sessions.current_user(), None);
        sessions.logout();
        assert_eq!(sessions.current_user(), None);
        assert_eq!(sessions.session(), &Session::Anonymous);
    }

    #[test]
    fn test_login_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut sessions = manager(dir.path());
            sessions.register("alice", "pass1", None).unwrap();
        }

        let mut sessions = manager(dir.path());
        assert_eq!(sessions.current_user(), None);
        sessions.login("alice", "pass1").unwrap();
        assert_eq!(sessions.current_user(), Some("alice"));
    }

    #[test]
    fn test_change_password() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();

        sessions.change_password("alice", "pass1", "newpass").unwrap();

        // No login recorded, no session change
        assert_eq!(sessions.current_user(), None);
        assert_eq!(sessions.account("alice").unwrap().last_login, None);

        assert!(matches!(
            sessions.login("alice", "pass1"),
            Err(AuthError::InvalidCredentials)
        ));
        sessions.login("alice", "newpass").unwrap();

        let mut reopened = manager(dir.path());
        reopened.login("alice", "newpass").unwrap();
    }

    #[test]
    fn test_change_password_failures() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();

        assert!(matches!(
            sessions.change_password("alice", "wrong", "newpass"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            sessions.change_password("nobody", "pass1", "newpass"),
            Err(AuthError::UserNotFound(_))
        ));
        assert!(matches!(
            sessions.change_password("alice", "pass1", "abc"),
            Err(AuthError::WeakPassword { .. })
        ));
        sessions.login("alice", "pass1").unwrap();
    }

    #[test]
    fn test_legacy_record_is_upgraded_on_login() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let legacy = format!(
            r#"{{"bob": {{"password_hash": "{}", "email": "b@example.com",
                "created_at": "2024-03-01 12:30:00", "last_login": null}}}}"#,
            legacy_digest("hunter2")
        );
        fs::write(&path, legacy).unwrap();

        let mut sessions = manager(dir.path());
        assert!(matches!(
            sessions.login("bob", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));
        sessions.login("bob", "hunter2").unwrap();

        let reopened = CredentialStore::open(&path);
        let record = reopened.get("bob").unwrap();
        assert!(record.password_hash.starts_with("$argon2id$"));
        assert_eq!(record.email(), Some("b@example.com"));

        let mut sessions = manager(dir.path());
        sessions.login("bob", "hunter2").unwrap();
    }

    /// A directory where the save's scratch file goes makes every save fail.
    fn block_saves(dir: &Path) -> std::path::PathBuf {
        let blocker = dir.join("users.json.tmp");
        fs::create_dir(&blocker).unwrap();
        blocker
    }

    #[test]
    fn test_failed_login_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        let legacy = format!(
            r#"{{"bob": {{"password_hash": "{}", "created_at": "2024-03-01 12:30:00"}}}}"#,
            legacy_digest("hunter2")
        );
        fs::write(&path, legacy).unwrap();

        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();
        sessions.login("alice", "pass1").unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        let blocker = block_saves(dir.path());
        let err = sessions.login("bob", "hunter2").unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(sessions.current_user(), Some("alice"));

        let record = sessions.store().get("bob").unwrap();
        assert_eq!(record.password_hash, legacy_digest("hunter2"));
        assert_eq!(record.last_login(), None);
        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);

        fs::remove_dir(&blocker).unwrap();
        sessions.login("bob", "hunter2").unwrap();
        assert_eq!(sessions.current_user(), Some("bob"));
        assert!(sessions.store().get("bob").unwrap().password_hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_failed_change_password_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut sessions = manager(dir.path());
        sessions.register("alice", "pass1", None).unwrap();
        sessions.login("alice", "pass1").unwrap();
        let before = sessions.store().get("alice").cloned();

        let blocker = block_saves(dir.path());
        let err = sessions
            .change_password("alice", "pass1", "newpass")
            .unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(sessions.store().get("alice").cloned(), before);
        assert_eq!(sessions.current_user(), Some("alice"));

        fs::remove_dir(&blocker).unwrap();
        assert!(matches!(
            sessions.login("alice", "newpass"),
            Err(AuthError::InvalidCredentials)
        ));
        sessions.login("alice", "pass1").unwrap();

        let mut reopened = manager(dir.path());
        reopened.login("alice", "pass1").unwrap();
    }

    #[test]
    fn test_failed_save_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the data directory should be
        let blocker = dir.path().join("data");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("users.json");

        let mut sessions =
            SessionManager::new(CredentialStore::open(&path), test_hasher());
        let err = sessions.register("alice", "pass1", None).unwrap_err();
        assert!(err.is_persistence());
        assert!(!sessions.store().contains("alice"));
        assert_eq!(sessions.current_user(), None);
    }
}
