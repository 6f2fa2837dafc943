// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use chrono::Utc;
use parley_model::{Message, TokenUsage};

/// Usage counters for one chat session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionUsage {
    /// The most recently observed usage delta.
    pub last_message: TokenUsage,
    /// Running sum of every observed delta.
    pub cumulative: TokenUsage,
}

struct Inner {
    system_prompt: String,
    messages: Vec<Message>,
    usage: SessionUsage,
}

/// Thread-safe conversation history and usage counters.
///
/// Every public operation is serialized through a single mutex.  Long-running
/// I/O must never happen while the lock is held: callers `snapshot()` a
/// consistent view, stream outside the lock, and commit with
/// `append_messages` when the turn terminates.  Readers therefore observe
/// either the complete pre-append or complete post-append state, never a
/// partial one.
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new(system_prompt: impl Into<String>, initial_messages: Vec<Message>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                system_prompt: system_prompt.into(),
                messages: initial_messages,
                usage: SessionUsage::default(),
            }),
        }
    }

    /// A consistent copy of `(system_prompt, messages)`.  The copy does not
    /// alias internal storage.
    pub fn snapshot(&self) -> (String, Vec<Message>) {
        let inner = self.inner.lock().unwrap();
        (inner.system_prompt.clone(), inner.messages.clone())
    }

    /// Append messages atomically, stamping missing timestamps.
    ///
    /// When `usage` is non-zero it becomes `last_message` and is added into
    /// `cumulative`; a zero-usage input leaves the counters untouched.
    pub fn append_messages(&self, msgs: Vec<Message>, usage: Option<TokenUsage>) {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        for mut m in msgs {
            if m.timestamp.is_none() {
                m.timestamp = Some(now);
            }
            inner.messages.push(m);
        }
        if let Some(u) = usage {
            if !u.is_zero() {
                inner.usage.last_message = u;
                inner.usage.cumulative.add(&u);
            }
        }
    }

    /// Apply a usage delta without appending.  Zero-usage is a no-op.
    ///
    /// `last_message` always reflects the most recent observation while
    /// `cumulative` sums every delta.
    pub fn update_usage(&self, usage: TokenUsage) {
        if usage.is_zero() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.usage.last_message = usage;
        inner.usage.cumulative.add(&usage);
    }

    /// Defensive copy of the full history.
    pub fn history(&self) -> (String, Vec<Message>) {
        self.snapshot()
    }

    pub fn token_usage(&self) -> SessionUsage {
        self.inner.lock().unwrap().usage
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
