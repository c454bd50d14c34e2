// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::error::ProviderError;
use crate::{CompletionRequest, LlmResponse, ResponseEvent, ToolCall};

pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<ResponseEvent, ProviderError>> + Send>>;

/// Common interface every provider adapter implements, regardless of its
/// underlying wire format (OpenAI-compatible `tool_calls` arrays vs.
/// Anthropic-style `content_block` events).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Human-readable provider name (used in logs and the `status` CLI output).
    fn name(&self) -> &str;

    /// Model identifier as configured.
    fn model_name(&self) -> &str;

    /// Open a streaming completion call and return the raw event stream.
    /// Adapters build this over their own SSE parsing; the wire-level code
    /// keeps its natural `Stream` shape here.
    async fn stream_completion(&self, req: CompletionRequest) -> Result<ResponseStream, ProviderError>;

    /// Drive `stream_completion` to completion, invoking `on_chunk` for every
    /// event as it arrives and assembling the final `LlmResponse`.
    ///
    /// Tool-call argument fragments are accumulated by `index`: a provider
    /// may emit the id/name in one event and stream the JSON arguments across
    /// several subsequent deltas for the same call.
    async fn chat_stream(
        &self,
        req: CompletionRequest,
        on_chunk: &mut (dyn FnMut(&ResponseEvent) + Send),
    ) -> Result<LlmResponse, ProviderError> {
        let mut stream = self.stream_completion(req).await?;
        let mut text = String::new();
        let mut calls: BTreeMap<u32, ToolCall> = BTreeMap::new();

        while let Some(event) = stream.next().await {
            let event = event?;
            on_chunk(&event);
            match &event {
                ResponseEvent::TextDelta(delta) => text.push_str(delta),
                ResponseEvent::ToolCall { index, id, name, arguments } => {
                    let entry = calls.entry(*index).or_insert_with(|| ToolCall {
                        id: String::new(),
                        name: String::new(),
                        arguments: String::new(),
                    });
                    if !id.is_empty() {
                        entry.id = id.clone();
                    }
                    if !name.is_empty() {
                        entry.name = name.clone();
                    }
                    entry.arguments.push_str(arguments);
                }
                ResponseEvent::Usage { .. } | ResponseEvent::Done => {}
                ResponseEvent::Error(msg) => {
                    return Err(ProviderError::ApiRequestFailed(msg.clone()));
                }
            }
        }

        Ok(LlmResponse {
            content: if text.is_empty() { None } else { Some(text) },
            tool_calls: calls.into_values().collect(),
        })
    }
}
