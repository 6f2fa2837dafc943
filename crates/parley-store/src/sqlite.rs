// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::{NewRecord, Record, Result, SessionMetrics, Store, StoreError};

/// SQLite-backed store.  One file per database; survives process restarts.
///
/// rusqlite connections are not `Sync`, so the connection sits behind a
/// mutex.  All statements run synchronously; callers that need to keep an
/// async runtime responsive wrap calls in `spawn_blocking`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.as_ref().display(), "opened session store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database.  Used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id    TEXT NOT NULL,
    role          TEXT NOT NULL,
    contents      TEXT NOT NULL,
    live          INTEGER NOT NULL DEFAULT 1,
    status        TEXT NOT NULL DEFAULT '',
    input_tokens  INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    timestamp     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_session ON records(session_id);

CREATE TABLE IF NOT EXISTS metrics (
    session_id    TEXT PRIMARY KEY,
    input_tokens  INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    total_tokens  INTEGER NOT NULL DEFAULT 0,
    cached_tokens INTEGER NOT NULL DEFAULT 0
);
";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    let ts: String = row.get("timestamp")?;
    Ok(Record {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: row.get("role")?,
        contents: row.get("contents")?,
        live: row.get::<_, i64>("live")? != 0,
        status: row.get("status")?,
        input_tokens: row.get::<_, i64>("input_tokens")? as u32,
        output_tokens: row.get::<_, i64>("output_tokens")? as u32,
        timestamp: DateTime::parse_from_rfc3339(&ts)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

impl Store for SqliteStore {
    fn add_record(&self, rec: NewRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let ts = rec.timestamp.unwrap_or_else(Utc::now).to_rfc3339();
        conn.execute(
            "INSERT INTO records
                 (session_id, role, contents, live, status, input_tokens, output_tokens, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rec.session_id,
                rec.role,
                rec.contents,
                rec.live as i64,
                rec.status,
                rec.input_tokens as i64,
                rec.output_tokens as i64,
                ts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn get_all_records(&self, session_id: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM records WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_live_records(&self, session_id: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM records WHERE session_id = ?1 AND live = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], row_to_record)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn update_record(&self, id: i64, contents: &str, status: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE records SET contents = ?1, status = ?2 WHERE id = ?3",
            params![contents, status, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn mark_live(&self, id: i64) -> Result<()> {
        self.set_live(id, true)
    }

    fn mark_dead(&self, id: i64) -> Result<()> {
        self.set_live(id, false)
    }

    fn delete_record(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute("DELETE FROM records WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM records WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    fn save_metrics(&self, session_id: &str, m: &SessionMetrics) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO metrics (session_id, input_tokens, output_tokens, total_tokens, cached_tokens)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(session_id) DO UPDATE SET
                 input_tokens = excluded.input_tokens,
                 output_tokens = excluded.output_tokens,
                 total_tokens = excluded.total_tokens,
                 cached_tokens = excluded.cached_tokens",
            params![
                session_id,
                m.input_tokens as i64,
                m.output_tokens as i64,
                m.total_tokens as i64,
                m.cached_tokens as i64,
            ],
        )?;
        Ok(())
    }

    fn load_metrics(&self, session_id: &str) -> Result<Option<SessionMetrics>> {
        let conn = self.conn.lock().unwrap();
        let metrics = conn
            .query_row(
                "SELECT input_tokens, output_tokens, total_tokens, cached_tokens
                 FROM metrics WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(SessionMetrics {
                        input_tokens: row.get::<_, i64>(0)? as u64,
                        output_tokens: row.get::<_, i64>(1)? as u64,
                        total_tokens: row.get::<_, i64>(2)? as u64,
                        cached_tokens: row.get::<_, i64>(3)? as u64,
                    })
                },
            )
            .optional()?;
        Ok(metrics)
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT session_id FROM records
             UNION
             SELECT session_id FROM metrics
             ORDER BY session_id",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM records WHERE session_id = ?1",
            params![session_id],
        )?;
        conn.execute(
            "DELETE FROM metrics WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        // WAL checkpoint so a subsequent open sees everything even if the
        // process is killed before the connection drops.  The pragma returns
        // a status row, hence query_row rather than execute.
        let conn = self.conn.lock().unwrap();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
        Ok(())
    }
}

impl SqliteStore {
    fn set_live(&self, id: i64, live: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE records SET live = ?1 WHERE id = ?2",
            params![live as i64, id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
