//! Per-user conversion history.
//!
//! Each username owns one JSON file under the history directory, created on
//! first write. A `UserHistory` is always loaded fresh from disk, so nothing
//! carries over from one login to the next.

pub mod store;

pub use store::{HistoryEntry, HistoryStore, UserHistory, DEFAULT_HISTORY_LIMIT};
