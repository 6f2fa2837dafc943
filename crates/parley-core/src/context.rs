// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Callback recomputed per outbound request to produce the current
/// system-reminder text.  Never persisted as a message of its own.
pub type ReminderFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Per-call carrier for cancellation and the optional system-reminder
/// callback.  Cheap to clone; handlers receive a clone so they can consult
/// the cancellation signal mid-execution.
#[derive(Clone, Default)]
pub struct TurnContext {
    cancel: CancellationToken,
    reminder: Option<ReminderFn>,
}

impl TurnContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a reminder callback.  It is evaluated lazily before each
    /// outbound request of a turn, so the injected text always reflects the
    /// current state.
    pub fn with_reminder(mut self, f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.reminder = Some(Arc::new(f));
        self
    }

    /// Request cancellation.  Streams abort at the next event; tool batches
    /// stop before the next handler starts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The underlying token, for `select!`-style waits.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Evaluate the reminder callback, if one is attached.  Empty output is
    /// treated as "no reminder".
    pub fn reminder_text(&self) -> Option<String> {
        self.reminder
            .as_ref()
            .map(|f| f())
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Debug for TurnContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_reminder", &self.reminder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_is_not_cancelled() {
        let ctx = TurnContext::new();
        assert!(!ctx.is_cancelled());
        assert!(ctx.reminder_text().is_none());
    }

    #[test]
    fn cancel_is_observable() {
        let ctx = TurnContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.is_cancelled(), "cancellation must propagate to clones");
    }

    #[test]
    fn reminder_is_recomputed_on_every_call() {
        use std::sync::atomic::{AtomicU32, Ordering};
        let n = Arc::new(AtomicU32::new(0));
        let n2 = Arc::clone(&n);
        let ctx = TurnContext::new()
            .with_reminder(move || format!("round {}", n2.fetch_add(1, Ordering::SeqCst)));
        assert_eq!(ctx.reminder_text().as_deref(), Some("round 0"));
        assert_eq!(ctx.reminder_text().as_deref(), Some("round 1"));
    }

    #[test]
    fn empty_reminder_output_is_none() {
        let ctx = TurnContext::new().with_reminder(String::new);
        assert!(ctx.reminder_text().is_none());
    }
}
