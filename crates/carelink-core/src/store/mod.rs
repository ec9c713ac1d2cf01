//! Persistent key-value storage.
//!
//! The core keeps everything as JSON blobs behind a tiny `get/set/remove`
//! contract so the appointment repository and the reminder scheduler never
//! see SQL. The default backend is a single-table SQLite store; tests use the
//! in-memory map.

mod memory;
mod sqlite;

pub use memory::*;
pub use sqlite::*;

use serde_json::Value;
use thiserror::Error;

/// Key for the whole appointment collection.
pub const APPOINTMENTS_KEY: &str = "carelink.appointments";
/// Key for reminders that have not fired yet.
pub const PENDING_REMINDERS_KEY: &str = "carelink.reminders.pending";
/// Key for ids of reminders that have already been delivered.
pub const FIRED_REMINDERS_KEY: &str = "carelink.reminders.fired";
/// Key for the bounded history of delivered reminders.
pub const REMINDER_HISTORY_KEY: &str = "carelink.reminders.history";

/// Storage errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store of JSON blobs.
///
/// Implementations must be safe to share between the UI-driven service calls
/// and the reminder engine thread, hence `Send + Sync`.
pub trait KvStore: Send + Sync {
    /// Fetch the blob for a key, `None` if absent.
    fn get(&self, key: &str) -> StoreResult<Option<Value>>;

    /// Replace the blob for a key.
    fn set(&self, key: &str, value: Value) -> StoreResult<()>;

    /// Drop a key entirely. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;
}
