// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use parley_model::{Error, ToolDef};

use crate::context::TurnContext;

/// A registered tool implementation.
///
/// Handlers receive the turn's carrier context (for cancellation checks) and
/// the raw JSON argument document, and return their result verbatim as a
/// string.  Errors and panics are converted into structured tool results by
/// the orchestrator; they never abort the turn.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: TurnContext, args_json: String) -> Result<String, Error>;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(TurnContext, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, Error>> + Send,
{
    async fn call(&self, ctx: TurnContext, args_json: String) -> Result<String, Error> {
        (self.0)(ctx, args_json).await
    }
}

/// Wrap an async closure as a tool handler.
///
/// ```ignore
/// registry.register(def, tool_fn(|_ctx, args| async move {
///     Ok(format!("echo: {args}"))
/// }))?;
/// ```
pub fn tool_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(TurnContext, String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, Error>> + Send,
{
    FnHandler(f)
}

/// A definition/handler pair as stored in the registry.
#[derive(Clone)]
pub struct ToolEntry {
    pub def: ToolDef,
    pub handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, ToolEntry>,
    /// Registration order.  Replacing an existing tool keeps its position.
    order: Vec<String>,
}

/// Thread-safe name → (definition, handler) mapping preserving registration
/// order.  Reads dominate (every request snapshots the tool set), so the
/// map lives behind a reader/writer lock.
#[derive(Default)]
pub struct ToolRegistry {
    inner: RwLock<Inner>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.  A tool with the same name is replaced in place,
    /// keeping its slot in the registration order; a new name is appended.
    pub fn register(
        &self,
        def: ToolDef,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), Error> {
        if def.name.is_empty() {
            return Err(Error::InvalidArgument("tool name must not be empty".into()));
        }
        let mut inner = self.inner.write().unwrap();
        let name = def.name.clone();
        let entry = ToolEntry {
            def,
            handler: Arc::new(handler),
        };
        if inner.entries.insert(name.clone(), entry).is_none() {
            inner.order.push(name);
        }
        Ok(())
    }

    /// Remove a tool.  No-op if absent.
    pub fn deregister(&self, name: &str) {
        let mut inner = self.inner.write().unwrap();
        if inner.entries.remove(name).is_some() {
            inner.order.retain(|n| n != name);
        }
    }

    pub fn get(&self, name: &str) -> Option<ToolEntry> {
        self.inner.read().unwrap().entries.get(name).cloned()
    }

    /// Snapshot of all entries in registration order.  Mutation after the
    /// snapshot does not affect the returned view.
    pub fn get_all(&self) -> Vec<ToolEntry> {
        let inner = self.inner.read().unwrap();
        inner
            .order
            .iter()
            .filter_map(|n| inner.entries.get(n).cloned())
            .collect()
    }

    /// Definitions only, in registration order.
    pub fn defs(&self) -> Vec<ToolDef> {
        self.get_all().into_iter().map(|e| e.def).collect()
    }

    /// Registered names in registration order (a defensive copy).
    pub fn list(&self) -> Vec<String> {
        self.inner.read().unwrap().order.clone()
    }

    /// Execute a tool by name.
    ///
    /// The handler runs in a spawned task so a panic is caught and surfaced
    /// as `ToolExecution` instead of tearing down the caller.
    pub async fn execute(
        &self,
        ctx: &TurnContext,
        name: &str,
        args_json: &str,
    ) -> Result<String, Error> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;
        let handler = Arc::clone(&entry.handler);
        let ctx = ctx.clone();
        let args = args_json.to_string();
        match tokio::spawn(async move { handler.call(ctx, args).await }).await {
            Ok(result) => result,
            Err(e) => Err(Error::ToolExecution(format!("tool panicked: {e}"))),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
