// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

/// Error kinds surfaced by the chat core.
///
/// Per-tool failures (`ToolNotFound`, `ToolExecution`) are recoverable: the
/// orchestrator converts them into structured tool results and feeds them
/// back to the model rather than aborting the turn.  Transport and
/// serialization failures abort the current turn without mutating history.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("no provider matches model {0:?}")]
    UnknownProvider(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("tool {0} not found")]
    ToolNotFound(String),

    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    #[error("cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
