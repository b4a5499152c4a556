//! Whole-file JSON persistence shared by the credential store and the
//! history namespaces.
//!
//! Reads never fail: a missing file and an unreadable file both yield the
//! default value, but they are reported as distinct [`LoadOutcome`]s and an
//! unreadable file is moved aside so the next save does not overwrite it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::PersistenceError;

/// Suffix appended to a file that failed to parse.
const CORRUPT_SUFFIX: &str = "corrupt";

/// Suffix of the scratch file written before the atomic rename.
const TEMP_SUFFIX: &str = "tmp";

/// What happened when a persisted file was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// No file yet (first run, or nothing written for this namespace).
    Missing,
    /// The file existed but could not be read or parsed.
    Unreadable {
        reason: String,
        /// Where the unreadable file was moved, if the move succeeded.
        backup: Option<PathBuf>,
    },
}

impl LoadOutcome {
    pub fn is_unreadable(&self) -> bool {
        matches!(self, LoadOutcome::Unreadable { .. })
    }
}

/// Read `path` as JSON, falling back to `T::default()`.
pub fn read_json<T: DeserializeOwned + Default>(path: &Path) -> (T, LoadOutcome) {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No file yet, starting empty");
            return (T::default(), LoadOutcome::Missing);
        }
        Err(e) => return (T::default(), unreadable(path, e.to_string())),
    };

    match serde_json::from_str(&contents) {
        Ok(value) => (value, LoadOutcome::Loaded),
        Err(e) => (T::default(), unreadable(path, e.to_string())),
    }
}

fn unreadable(path: &Path, reason: String) -> LoadOutcome {
    let backup = free_backup_path(path);
    let backup = match fs::rename(path, &backup) {
        Ok(()) => Some(backup),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not move unreadable file aside");
            None
        }
    };
    warn!(
        path = %path.display(),
        reason = %reason,
        backup = ?backup,
        "Unreadable file, starting empty"
    );
    LoadOutcome::Unreadable { reason, backup }
}

/// `<name>.corrupt`, or `<name>.corrupt.N` with the first free N, so earlier
/// backups are never replaced.
fn free_backup_path(path: &Path) -> PathBuf {
    let first = sibling(path, CORRUPT_SUFFIX);
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sibling(path, &format!("{}.{}", CORRUPT_SUFFIX, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Serialize `value` and replace `path` with it atomically.
///
/// The data is written to a sibling temp file which is then renamed over the
/// target, so readers see either the old file or the new one.
pub fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let contents = serde_json::to_string_pretty(value)?;
    let tmp = sibling(path, TEMP_SUFFIX);
    if let Err(source) = fs::write(&tmp, contents) {
        discard(&tmp);
        return Err(PersistenceError::Write { path: tmp, source });
    }
    if let Err(source) = fs::rename(&tmp, path) {
        discard(&tmp);
        return Err(PersistenceError::Rename {
            from: tmp,
            to: path.to_path_buf(),
            source,
        });
    }

    debug!(path = %path.display(), "Saved");
    Ok(())
}

/// Remove a scratch file left by a failed save.
fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != std::io::ErrorKind::NotFound {
            debug!(path = %tmp.display(), error = %e, "Could not remove temp file");
        }
    }
}

/// `users.json` -> `users.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (value, outcome): (BTreeMap<String, u32>, _) = read_json(&dir.path().join("nope.json"));
        assert!(value.is_empty());
        assert_eq!(outcome, LoadOutcome::Missing);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);

        write_json_atomic(&path, &map).unwrap();
        let (loaded, outcome): (BTreeMap<String, u32>, _) = read_json(&path);

        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(loaded, map);
        assert!(!sibling(&path, TEMP_SUFFIX).exists());
    }

    #[test]
    fn test_unreadable_file_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").unwrap();

        let (value, outcome): (BTreeMap<String, u32>, _) = read_json(&path);

        assert!(value.is_empty());
        let backup = match outcome {
            LoadOutcome::Unreadable { backup, .. } => backup.unwrap(),
            other => panic!("expected unreadable, got {:?}", other),
        };
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(backup).unwrap(), "{ not json");
    }

    #[test]
    fn test_repeated_corruption_keeps_every_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");

        let mut backups = Vec::new();
        for contents in ["{ first lost accounts", "{ second", "{ third"] {
            fs::write(&path, contents).unwrap();
            let (_, outcome): (BTreeMap<String, u32>, _) = read_json(&path);
            match outcome {
                LoadOutcome::Unreadable { backup, .. } => backups.push(backup.unwrap()),
                other => panic!("expected unreadable, got {:?}", other),
            }
        }

        assert_eq!(
            backups,
            vec![
                dir.path().join("users.json.corrupt"),
                dir.path().join("users.json.corrupt.1"),
                dir.path().join("users.json.corrupt.2"),
            ]
        );
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), "{ first lost accounts");
        assert_eq!(fs::read_to_string(&backups[1]).unwrap(), "{ second");
        assert_eq!(fs::read_to_string(&backups[2]).unwrap(), "{ third");
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let path = dir.path().join("data.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = write_json_atomic(&path, &BTreeMap::<String, u32>::new()).unwrap_err();

        assert!(matches!(err, PersistenceError::Rename { .. }));
        assert!(!sibling(&path, TEMP_SUFFIX).exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn test_sibling_name() {
        let p = Path::new("/tmp/users.json");
        assert_eq!(sibling(p, "tmp"), PathBuf::from("/tmp/users.json.tmp"));
    }
}
