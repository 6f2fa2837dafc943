// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Session persistence: a session-id keyed record store with an in-memory
//! and a SQLite-backed implementation.
//!
//! The chat core does not depend on this crate; callers that want a full
//! audit trail write records from a streaming callback at the boundary.
//! Both implementations are behaviorally indistinguishable on the trait
//! operations; the SQLite store additionally persists across process
//! restarts.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(i64),

    #[error("store error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One persisted conversation record.
///
/// `contents` is the JSON-encoded content-part list of the message.  The
/// `live` flag marks whether the record currently participates in the
/// active context window; compaction logic above this crate flips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub session_id: String,
    pub role: String,
    pub contents: String,
    pub live: bool,
    pub status: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub timestamp: DateTime<Utc>,
}

/// Fields for a record about to be inserted.  The store assigns the id and
/// stamps a missing timestamp.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub session_id: String,
    pub role: String,
    pub contents: String,
    pub live: bool,
    pub status: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewRecord {
    pub fn new(session_id: impl Into<String>, role: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            role: role.into(),
            contents: contents.into(),
            live: true,
            status: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            timestamp: None,
        }
    }
}

/// Aggregated token counters saved per session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cached_tokens: u64,
}

/// A session-id keyed record store.
///
/// Records are created by `add_record`, mutated only through the explicit
/// update/mark operations, and removed only by `delete_record`, `clear`, or
/// `delete_session`.  Mutations of absent records fail with `NotFound`.
pub trait Store: Send + Sync {
    /// Insert a record and return its assigned id.  Ids are monotonically
    /// increasing per store.
    fn add_record(&self, rec: NewRecord) -> Result<i64>;

    /// All records of a session, in insertion order.
    fn get_all_records(&self, session_id: &str) -> Result<Vec<Record>>;

    /// Only records with the `live` flag set, in insertion order.
    fn get_live_records(&self, session_id: &str) -> Result<Vec<Record>>;

    /// Replace a record's contents and status.
    fn update_record(&self, id: i64, contents: &str, status: &str) -> Result<()>;

    fn mark_live(&self, id: i64) -> Result<()>;
    fn mark_dead(&self, id: i64) -> Result<()>;

    fn delete_record(&self, id: i64) -> Result<()>;

    /// Remove all records of a session.  Metrics are kept.
    fn clear(&self, session_id: &str) -> Result<()>;

    /// Upsert the session's aggregated counters.
    fn save_metrics(&self, session_id: &str, metrics: &SessionMetrics) -> Result<()>;

    fn load_metrics(&self, session_id: &str) -> Result<Option<SessionMetrics>>;

    /// Every session id known to the store (records or metrics), sorted.
    fn list_sessions(&self) -> Result<Vec<String>>;

    /// Remove a session's records and metrics.
    fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Flush pending state.  The store must not be used afterwards.
    fn close(&self) -> Result<()>;
}
