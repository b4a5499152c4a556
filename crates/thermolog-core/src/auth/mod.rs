//! Local authentication: credential storage and the session state machine.
//!
//! This module provides:
//! - `CredentialStore`: file-backed username -> `CredentialRecord` map
//! - `SessionManager`: register, login/logout and password change
//! - `Session`: the single current identity, `Anonymous` or `Authenticated`
//!
//! Passwords are hashed with Argon2id; see [`password`].

pub mod credentials;
pub mod password;
pub mod session;

pub use credentials::{CredentialRecord, CredentialStore};
pub use password::{CredentialHasher, HashParams, PasswordCheck, MIN_PASSWORD_LENGTH};
pub use session::{AccountInfo, Session, SessionManager};
