// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Provider registry: static metadata for every supported back-end.
//!
//! This module is the single source of truth for model-name routing and
//! credential defaults.  Construction logic lives in [`crate::from_config`].

/// Which adapter implementation serves a provider entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// OpenAI-style `/chat/completions` SSE.
    OpenAiChat,
    /// OpenAI Responses API (`/responses`, event-typed stream).
    OpenAiResponses,
    /// Anthropic Messages API.
    Anthropic,
    /// Google Gemini Generative Language API.
    Google,
    /// Self-hosted OpenAI-compatible endpoint (no credentials).
    SelfHosted,
}

/// Metadata describing a registered provider.
#[derive(Debug, Clone)]
pub struct ProviderMeta {
    /// Stable provider id (e.g. `"openai"`).
    pub id: &'static str,
    /// Human-readable display name.
    pub name: &'static str,
    pub kind: ProviderKind,
    /// Case-insensitive model-name prefixes routed to this provider.
    /// Earlier registry entries win, so more specific prefixes (e.g.
    /// `gpt-5`) must be listed before broader ones (`gpt-`).
    pub model_prefixes: &'static [&'static str],
    /// Environment variables consulted, in order, when no API key is given.
    pub api_key_envs: &'static [&'static str],
    /// Default endpoint when the caller does not override `base_url`.
    pub default_base_url: &'static str,
    pub requires_api_key: bool,
}

/// Complete registry of supported providers, in routing priority order.
pub static PROVIDERS: &[ProviderMeta] = &[
    ProviderMeta {
        id: "openai-responses",
        name: "OpenAI (Responses)",
        kind: ProviderKind::OpenAiResponses,
        model_prefixes: &["gpt-5", "o1", "o3"],
        api_key_envs: &["OPENAI_API_KEY"],
        default_base_url: "https://api.openai.com/v1",
        requires_api_key: true,
    },
    ProviderMeta {
        id: "openai",
        name: "OpenAI",
        kind: ProviderKind::OpenAiChat,
        model_prefixes: &["gpt-"],
        api_key_envs: &["OPENAI_API_KEY"],
        default_base_url: "https://api.openai.com/v1",
        requires_api_key: true,
    },
    ProviderMeta {
        id: "anthropic",
        name: "Anthropic",
        kind: ProviderKind::Anthropic,
        model_prefixes: &["claude-"],
        api_key_envs: &["ANTHROPIC_API_KEY"],
        default_base_url: "https://api.anthropic.com",
        requires_api_key: true,
    },
    ProviderMeta {
        id: "google",
        name: "Google Gemini",
        kind: ProviderKind::Google,
        model_prefixes: &["gemini-"],
        api_key_envs: &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        default_base_url: "https://generativelanguage.googleapis.com",
        requires_api_key: true,
    },
    ProviderMeta {
        id: "self-hosted",
        name: "Self-hosted (OpenAI-compatible)",
        kind: ProviderKind::SelfHosted,
        model_prefixes: &[
            "llama",
            "mistral",
            "mixtral",
            "qwen",
            "phi",
            "deepseek",
            "codellama",
        ],
        api_key_envs: &[],
        default_base_url: "http://localhost:11434/v1",
        requires_api_key: false,
    },
];

/// Resolve the provider serving `model` by case-insensitive prefix match.
///
/// Returns `None` when no prefix matches; callers surface that as
/// `Error::UnknownProvider`.
pub fn resolve(model: &str) -> Option<&'static ProviderMeta> {
    let lower = model.to_ascii_lowercase();
    PROVIDERS
        .iter()
        .find(|p| p.model_prefixes.iter().any(|pre| lower.starts_with(pre)))
}

/// Resolve the API key for `meta`: explicit key first, then the provider's
/// environment variables in declaration order.
pub fn resolve_api_key(meta: &ProviderMeta, explicit: Option<&str>) -> Option<String> {
    if let Some(k) = explicit {
        if !k.is_empty() {
            return Some(k.to_string());
        }
    }
    meta.api_key_envs
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
}

/// Returns all registered providers in routing priority order.
pub fn list_providers() -> &'static [ProviderMeta] {
    PROVIDERS
}
