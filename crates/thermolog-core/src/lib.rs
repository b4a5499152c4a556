//! thermolog-core - credential store, sessions and per-user history for the
//! thermolog temperature converter.
//!
//! A presentation layer drives everything through [`SessionManager`] and
//! [`HistoryStore`]:
//!
//! - `auth`: credential storage, password hashing, the session state machine
//! - `history`: one conversion history namespace per username
//! - `convert`: temperature scales and conversions
//! - `config`: configuration file and directory layout
//! - `persist`: atomic JSON files with a typed load outcome

pub mod auth;
pub mod config;
pub mod convert;
pub mod error;
pub mod history;
pub mod persist;

pub use auth::{
    AccountInfo, CredentialHasher, CredentialRecord, CredentialStore, HashParams, Session,
    SessionManager,
};
pub use config::Config;
pub use convert::{convert, is_acceptable_partial, Conversion, Reading, Scale};
pub use error::{AuthError, ConversionError, PersistenceError};
pub use history::{HistoryEntry, HistoryStore, UserHistory};
pub use persist::LoadOutcome;

/// Build a session manager and history store from `config`.
pub fn open(config: &Config) -> anyhow::Result<(SessionManager, HistoryStore)> {
    let store = CredentialStore::open(config.users_path()?);
    let hasher = CredentialHasher::new(config.hashing)?;
    let sessions =
        SessionManager::new(store, hasher).with_min_password_length(config.min_password_length);
    let histories = HistoryStore::new(config.history_dir()?, config.history_limit);
    Ok((sessions, histories))
}
