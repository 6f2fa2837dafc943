// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod catalog;
pub mod registry;
mod anthropic;
mod backend;
mod error;
mod google;
mod mock;
mod openai;
mod responses;
mod types;

pub use anthropic::AnthropicBackend;
pub use backend::{ChatBackend, ResponseStream};
pub use error::Error;
pub use google::GoogleBackend;
pub use mock::{MockBackend, ScriptedEvent, ScriptedMockBackend};
pub use openai::{AuthStyle, OpenAiChatBackend};
pub use registry::{resolve, ProviderKind, ProviderMeta};
pub use responses::OpenAiResponsesBackend;
pub use types::*;

use serde::{Deserialize, Serialize};

/// Configuration for constructing a client.
///
/// Only `model` is required; everything else has a provider-appropriate
/// default.  When `api_key` is empty the provider's environment variables
/// are consulted in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl ClientConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

/// Construct a boxed [`ChatBackend`] from configuration.
///
/// The adapter is selected by case-insensitive model-name prefix (see
/// [`registry`]).  `gpt-5*` / `o1*` / `o3*` use the Responses API; other
/// `gpt-*` models use Chat Completions; `claude-*` → Anthropic; `gemini-*` →
/// Gemini; common open-model names route to a self-hosted OpenAI-compatible
/// endpoint that needs no credentials.
pub fn from_config(cfg: &ClientConfig) -> Result<Box<dyn ChatBackend>, Error> {
    if cfg.model.is_empty() {
        return Err(Error::InvalidArgument("model must not be empty".into()));
    }

    let meta = registry::resolve(&cfg.model)
        .ok_or_else(|| Error::UnknownProvider(cfg.model.clone()))?;

    let key = registry::resolve_api_key(meta, cfg.api_key.as_deref());
    if meta.requires_api_key && key.is_none() {
        return Err(Error::MissingCredentials(format!(
            "{} requires an API key (set {})",
            meta.name,
            meta.api_key_envs.join(" or "),
        )));
    }

    let base_url = cfg
        .base_url
        .clone()
        .unwrap_or_else(|| meta.default_base_url.to_string());

    match meta.kind {
        ProviderKind::OpenAiChat => Ok(Box::new(OpenAiChatBackend::new(
            "openai",
            cfg.model.clone(),
            key,
            &base_url,
            cfg.max_tokens,
            cfg.temperature,
            AuthStyle::Bearer,
        ))),
        ProviderKind::OpenAiResponses => Ok(Box::new(OpenAiResponsesBackend::new(
            cfg.model.clone(),
            key,
            &base_url,
            cfg.max_tokens,
            cfg.temperature,
        ))),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicBackend::new(
            cfg.model.clone(),
            key,
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        ProviderKind::Google => Ok(Box::new(GoogleBackend::new(
            cfg.model.clone(),
            key,
            cfg.base_url.clone(),
            cfg.max_tokens,
            cfg.temperature,
        ))),
        ProviderKind::SelfHosted => Ok(Box::new(OpenAiChatBackend::new(
            "self-hosted",
            cfg.model.clone(),
            None, // no key needed
            &base_url,
            cfg.max_tokens,
            cfg.temperature,
            AuthStyle::None,
        ))),
    }
}
