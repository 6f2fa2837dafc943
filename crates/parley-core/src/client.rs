// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use parley_model::{from_config, ChatBackend, ClientConfig, Error, Message};

use crate::chat::Chat;

/// Entry point: resolves a back-end from configuration and hands out
/// [`Chat`] sessions bound to it.
pub struct Client {
    backend: Arc<dyn ChatBackend>,
    config: ClientConfig,
}

impl Client {
    /// Construct a client for `config.model`.
    ///
    /// Fails with `UnknownProvider` when no adapter matches the model name
    /// and with `MissingCredentials` when the provider requires an API key
    /// and neither the config nor the environment supplies one.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let backend: Arc<dyn ChatBackend> = Arc::from(from_config(&config)?);
        Ok(Self { backend, config })
    }

    /// Construct a client around an existing back-end.  Used by tests and
    /// embedders that provide their own transport.
    pub fn with_backend(backend: Arc<dyn ChatBackend>, config: ClientConfig) -> Self {
        Self { backend, config }
    }

    /// Open a new chat session.  `system_prompt` overrides the configured
    /// one when non-empty.
    pub fn new_chat(
        &self,
        system_prompt: impl Into<String>,
        initial_messages: Vec<Message>,
    ) -> Chat {
        let prompt: String = system_prompt.into();
        let prompt = if prompt.is_empty() {
            self.config.system_prompt.clone().unwrap_or_default()
        } else {
            prompt
        };
        Chat::new(
            Arc::clone(&self.backend),
            prompt,
            initial_messages,
            self.config.temperature,
            self.config.max_tokens,
        )
    }

    pub fn model(&self) -> &str {
        self.backend.model_name()
    }

    pub fn provider(&self) -> &str {
        self.backend.name()
    }
}
