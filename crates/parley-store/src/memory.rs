// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::{NewRecord, Record, Result, SessionMetrics, Store, StoreError};

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: Vec<Record>,
    metrics: HashMap<String, SessionMetrics>,
}

/// In-memory store.  State lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn add_record(&self, rec: NewRecord) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.records.push(Record {
            id,
            session_id: rec.session_id,
            role: rec.role,
            contents: rec.contents,
            live: rec.live,
            status: rec.status,
            input_tokens: rec.input_tokens,
            output_tokens: rec.output_tokens,
            timestamp: rec.timestamp.unwrap_or_else(Utc::now),
        });
        Ok(id)
    }

    fn get_all_records(&self, session_id: &str) -> Result<Vec<Record>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect())
    }

    fn get_live_records(&self, session_id: &str) -> Result<Vec<Record>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| r.session_id == session_id && r.live)
            .cloned()
            .collect())
    }

    fn update_record(&self, id: i64, contents: &str, status: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        rec.contents = contents.to_string();
        rec.status = status.to_string();
        Ok(())
    }

    fn mark_live(&self, id: i64) -> Result<()> {
        self.set_live(id, true)
    }

    fn mark_dead(&self, id: i64) -> Result<()> {
        self.set_live(id, false)
    }

    fn delete_record(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.records.len();
        inner.records.retain(|r| r.id != id);
        if inner.records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    fn clear(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.retain(|r| r.session_id != session_id);
        Ok(())
    }

    fn save_metrics(&self, session_id: &str, metrics: &SessionMetrics) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.metrics.insert(session_id.to_string(), *metrics);
        Ok(())
    }

    fn load_metrics(&self, session_id: &str) -> Result<Option<SessionMetrics>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.metrics.get(session_id).copied())
    }

    fn list_sessions(&self) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .records
            .iter()
            .map(|r| r.session_id.clone())
            .chain(inner.metrics.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.retain(|r| r.session_id != session_id);
        inner.metrics.remove(session_id);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

impl MemoryStore {
    fn set_live(&self, id: i64, live: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let rec = inner
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        rec.live = live;
        Ok(())
    }
}
