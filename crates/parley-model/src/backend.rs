// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::{CompletionRequest, Error, ResponseEvent};

/// A boxed event stream returned by a [`ChatBackend`].
///
/// Thin wrapper around `Pin<Box<dyn Stream<...> + Send>>` so the type can
/// implement `Debug` (trait objects over a foreign trait can't get a blanket
/// impl because of the orphan rule).
pub struct ResponseStream(Pin<Box<dyn Stream<Item = Result<ResponseEvent, Error>> + Send>>);

impl ResponseStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<ResponseEvent, Error>> + Send + 'static,
    {
        Self(Box::pin(stream))
    }
}

impl Stream for ResponseStream {
    type Item = Result<ResponseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.0.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResponseStream")
    }
}

/// One remote LLM back-end speaking its native wire protocol.
///
/// Implementations translate the neutral conversation model into the
/// provider request shape, open a streaming response, and demultiplex it
/// into [`ResponseEvent`]s.  The tool-call loop above this trait is shared.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Stable provider id for status display and logging.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    ///
    /// A failure before the first chunk is a `Transport` error; mid-stream
    /// failures surface as `Err` items on the stream.
    async fn complete(&self, req: CompletionRequest) -> Result<ResponseStream, Error>;

    /// Output-token cap for this model.
    ///
    /// Resolved from the static catalog; unknown models get a conservative
    /// default (the catalog logs a warning).
    fn max_output_tokens(&self) -> u32 {
        crate::catalog::max_output_tokens(self.model_name())
    }

    /// Context window for this model, from the static catalog.
    fn context_window(&self) -> u32 {
        crate::catalog::context_window(self.model_name())
    }
}

impl fmt::Debug for dyn ChatBackend + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatBackend")
            .field("name", &self.name())
            .field("model_name", &self.model_name())
            .finish()
    }
}
