// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adapter for any provider that speaks the OpenAI `chat/completions`
//! streaming wire format: OpenAI itself, OpenRouter, Groq, and the many
//! other gateways built on top of it.
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;

use crate::error::ProviderError;
use crate::provider::{ModelProvider, ResponseStream};
use crate::types::{CompletionRequest, Message, ResponseEvent, Role, ToolDefinition};

pub struct OpenAiCompatProvider {
    name: String,
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        req: CompletionRequest,
    ) -> Result<ResponseStream, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey(self.name.clone()));
        }

        let body = build_request_body(&req);
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimitExceeded);
        }
        if status.as_u16() >= 500 {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::ServiceUnavailable(format!("{status}: {text}")));
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::ApiRequestFailed(format!("{status}: {text}")));
        }

        // SSE events can be split across multiple TCP packets. Maintain a
        // line buffer across chunks; emit events only for complete lines.
        let byte_stream = resp.bytes_stream();
        let event_stream = byte_stream
            .scan(String::new(), |buf, chunk| {
                let events: Vec<Result<ResponseEvent, ProviderError>> = match chunk {
                    Ok(bytes) => {
                        buf.push_str(&String::from_utf8_lossy(&bytes));
                        drain_complete_sse_lines(buf)
                    }
                    Err(e) => vec![Err(ProviderError::Network(e.to_string()))],
                };
                std::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn build_request_body(req: &CompletionRequest) -> serde_json::Value {
    let messages: Vec<serde_json::Value> = req
        .messages
        .iter()
        .filter(|m| m.is_well_formed())
        .map(message_to_wire)
        .collect();

    let mut body = json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "stream": true,
    });
    if !req.tools.is_empty() {
        body["tools"] = json!(req.tools.iter().map(tool_to_wire).collect::<Vec<_>>());
    }
    body
}

fn message_to_wire(m: &Message) -> serde_json::Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut v = json!({ "role": role });
    if let Some(content) = &m.content {
        v["content"] = json!(content);
    } else if m.role != Role::Assistant {
        v["content"] = json!("");
    }
    if let Some(id) = &m.tool_call_id {
        v["tool_call_id"] = json!(id);
    }
    if !m.tool_calls.is_empty() {
        v["tool_calls"] = json!(m
            .tool_calls
            .iter()
            .map(|tc| json!({
                "id": tc.id,
                "type": "function",
                "function": { "name": tc.name, "arguments": tc.arguments },
            }))
            .collect::<Vec<_>>());
    }
    v
}

fn tool_to_wire(t: &ToolDefinition) -> serde_json::Value {
    json!({
        "type": "function",
        "function": {
            "name": t.name,
            "description": t.description,
            "parameters": t.parameters,
        },
    })
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Debug, Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
}

/// Parse a single complete SSE `data:` line into a [`ResponseEvent`].
/// Returns `None` for empty/non-data lines or events carrying nothing useful.
fn parse_sse_data_line(line: &str) -> Option<Result<ResponseEvent, ProviderError>> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(ResponseEvent::Done));
    }
    let chunk: Chunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => return Some(Err(ProviderError::ApiRequestFailed(e.to_string()))),
    };
    if let Some(usage) = chunk.usage {
        return Some(Ok(ResponseEvent::Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        }));
    }
    let delta = chunk.choices.into_iter().next()?.delta?;
    if let Some(tool_calls) = delta.tool_calls {
        let tc = tool_calls.into_iter().next()?;
        let function = tc.function.unwrap_or(ChunkFunction { name: None, arguments: None });
        return Some(Ok(ResponseEvent::ToolCall {
            index: tc.index,
            id: tc.id.unwrap_or_default(),
            name: function.name.unwrap_or_default(),
            arguments: function.arguments.unwrap_or_default(),
        }));
    }
    match delta.content {
        Some(text) if !text.is_empty() => Some(Ok(ResponseEvent::TextDelta(text))),
        _ => None,
    }
}

/// Drain all complete `\n`-terminated SSE lines from `buf`. Any trailing
/// incomplete line is left in `buf` so it can be extended by the next TCP
/// chunk — necessary because a single SSE event may be split across packets.
pub(crate) fn drain_complete_sse_lines(buf: &mut String) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(nl_pos) = buf.find('\n') {
        let line = buf[..nl_pos].trim_end_matches('\r').to_string();
        *buf = buf[nl_pos + 1..].to_string();
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}
