use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::PersistenceError;
use crate::persist::{self, LoadOutcome};

/// Stored identity data for one username.
///
/// The username itself is the key in [`CredentialStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub(crate) password_hash: String,
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(with = "timestamp")]
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub(crate) last_login: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub(crate) fn new(password_hash: String, email: Option<String>) -> Self {
        Self {
            password_hash,
            email,
            created_at: Utc::now(),
            last_login: None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }
}

/// File-backed mapping of username to [`CredentialRecord`].
///
/// Loaded once when opened; every mutation is followed by a whole-file
/// [`save`](Self::save). Only the session manager mutates records.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    users: BTreeMap<String, CredentialRecord>,
    load_outcome: LoadOutcome,
}

impl CredentialStore {
    /// Open the store at `path`. A missing or unreadable file yields an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (users, load_outcome) = persist::read_json::<BTreeMap<String, CredentialRecord>>(&path);
        if load_outcome == LoadOutcome::Loaded {
            info!(path = %path.display(), users = users.len(), "Credential store loaded");
        }
        Self {
            path,
            users,
            load_outcome,
        }
    }

    /// How the backing file looked when the store was opened.
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Rewrite the backing file with the full mapping.
    pub fn save(&self) -> Result<(), PersistenceError> {
        persist::write_json_atomic(&self.path, &self.users)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, username: &str) -> Option<&CredentialRecord> {
        self.users.get(username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    pub(crate) fn get_mut(&mut self, username: &str) -> Option<&mut CredentialRecord> {
        self.users.get_mut(username)
    }

    pub(crate) fn insert(&mut self, username: String, record: CredentialRecord) {
        self.users.insert(username, record);
    }

    pub(crate) fn remove(&mut self, username: &str) -> Option<CredentialRecord> {
        self.users.remove(username)
    }
}

/// Timestamps are written as RFC 3339. Files from the earlier tool used
/// `YYYY-MM-DD HH:MM:SS` in local time; those are still accepted on read.
mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT)
            .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| format!("nonexistent local time {:?}", raw))
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => s.serialize_some(&dt.to_rfc3339()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse(&raw).map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}
