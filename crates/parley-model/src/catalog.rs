// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model catalog: static per-model token limits, matched by name prefix.

use serde::Deserialize;
use tracing::warn;

/// Safe output cap used when the model is not in the catalog.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 4096;
/// Safe context window used when the model is not in the catalog.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 8192;

/// Token limits for one model-name prefix.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelLimits {
    /// Model-name prefix this entry covers (e.g. `gpt-4o`).
    pub prefix: String,
    /// Total context window in tokens (input + output).
    pub context_window: u32,
    /// Maximum output tokens per completion.
    pub max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelLimits>,
}

/// Return all entries from the bundled static catalog.
pub fn static_catalog() -> Vec<ModelLimits> {
    let yaml = include_str!("../models.yaml");
    let catalog: CatalogFile =
        serde_yaml::from_str(yaml).expect("bundled models.yaml must be valid");
    catalog.models
}

/// Look up the limits for `model` by longest matching prefix.
///
/// Returns `None` when no prefix matches.
pub fn lookup(model: &str) -> Option<ModelLimits> {
    let lower = model.to_ascii_lowercase();
    static_catalog()
        .into_iter()
        .filter(|e| lower.starts_with(&e.prefix))
        .max_by_key(|e| e.prefix.len())
}

/// Output-token cap for `model`, with a conservative default for unknown
/// models.  The warning fires once per call site; callers resolve limits at
/// construction time, not per request.
pub fn max_output_tokens(model: &str) -> u32 {
    match lookup(model) {
        Some(e) => e.max_output_tokens,
        None => {
            warn!(
                model,
                default = DEFAULT_MAX_OUTPUT_TOKENS,
                "model not in catalog; using conservative output cap"
            );
            DEFAULT_MAX_OUTPUT_TOKENS
        }
    }
}

/// Context window for `model`, with a conservative default for unknown models.
pub fn context_window(model: &str) -> u32 {
    lookup(model)
        .map(|e| e.context_window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

// ── Unit tests ────────────────────────────────────────────────────────────────
