use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::Session;
use crate::error::PersistenceError;
use crate::persist::{self, LoadOutcome};

/// Entries kept per user; older ones are dropped.
pub const DEFAULT_HISTORY_LIMIT: usize = 15;

const CSV_HEADER: [&str; 3] = ["Time", "Input", "Result"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub recorded_at: DateTime<Utc>,
    pub input: String,
    pub result: String,
}

impl HistoryEntry {
    pub fn new(input: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            recorded_at: Utc::now(),
            input: input.into(),
            result: result.into(),
        }
    }

    /// Local wall-clock time, for the history table.
    pub fn time_display(&self) -> String {
        self.recorded_at.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

/// Root of all per-user history namespaces.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
    limit: usize,
}

impl HistoryStore {
    /// `limit` is clamped to at least one entry.
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit: limit.max(1),
        }
    }

    /// File holding `username`'s history.
    ///
    /// The name is the hex of the username bytes so that distinct usernames
    /// never share a file, even on case-insensitive filesystems.
    pub fn namespace_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hex::encode(username.as_bytes())))
    }

    /// Load `username`'s history fresh from disk.
    pub fn open(&self, username: &str) -> UserHistory {
        let path = self.namespace_path(username);
        let (mut entries, outcome) = persist::read_json::<Vec<HistoryEntry>>(&path);
        entries.truncate(self.limit);
        debug!(username = %username, entries = entries.len(), ?outcome, "History opened");
        UserHistory {
            username: username.to_string(),
            path,
            limit: self.limit,
            entries,
            load_outcome: outcome,
        }
    }

    /// History of whoever `session` belongs to, or `None` when anonymous.
    pub fn open_for(&self, session: &Session) -> Option<UserHistory> {
        session.username().map(|username| self.open(username))
    }
}

/// One user's conversion history, newest entry first.
#[derive(Debug)]
pub struct UserHistory {
    username: String,
    path: PathBuf,
    limit: usize,
    entries: Vec<HistoryEntry>,
    load_outcome: LoadOutcome,
}

impl UserHistory {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepend an entry, drop anything past the limit, and persist.
    pub fn record(
        &mut self,
        input: impl Into<String>,
        result: impl Into<String>,
    ) -> Result<(), PersistenceError> {
        self.entries.insert(0, HistoryEntry::new(input, result));
        self.entries.truncate(self.limit);
        self.save()
    }

    pub fn clear(&mut self) -> Result<(), PersistenceError> {
        self.entries.clear();
        self.save()?;
        info!(username = %self.username, "History cleared");
        Ok(())
    }

    fn save(&self) -> Result<(), PersistenceError> {
        persist::write_json_atomic(&self.path, &self.entries)
    }

    /// Write the history as CSV with a `Time,Input,Result` header.
    pub fn export_csv<W: Write>(&self, mut writer: W) -> io::Result<()> {
        write_csv_row(&mut writer, CSV_HEADER)?;
        for entry in &self.entries {
            let time = entry
                .recorded_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            write_csv_row(
                &mut writer,
                [time.as_str(), entry.input.as_str(), entry.result.as_str()],
            )?;
        }
        writer.flush()
    }

    pub fn export_csv_to(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        self.export_csv(BufWriter::new(file))?;
        info!(username = %self.username, path = %path.display(), "History exported");
        Ok(())
    }
}

fn write_csv_row<W: Write, const N: usize>(writer: &mut W, fields: [&str; N]) -> io::Result<()> {
    let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    writeln!(writer, "{}", row.join(","))
}

/// Quote a field if it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
