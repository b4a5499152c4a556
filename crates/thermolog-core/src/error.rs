use std::path::PathBuf;

use thiserror::Error;

/// A write-through save did not reach the disk.
///
/// The caller must treat the mutation that triggered the save as not durable.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move {from} into place at {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize data: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("User already exists: {0}")]
    DuplicateUser(String),

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Changes were not saved: {0}")]
    Persistence(#[from] PersistenceError),
}

impl AuthError {
    /// True when the operation may have been applied but could not be made durable.
    pub fn is_persistence(&self) -> bool {
        matches!(self, AuthError::Persistence(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("Not a number: {0:?}")]
    InvalidNumber(String),

    #[error("Temperature below absolute zero: {value}{symbol}")]
    BelowAbsoluteZero { value: f64, symbol: &'static str },
}
