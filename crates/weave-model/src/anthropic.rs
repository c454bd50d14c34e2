// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Adapter for the Anthropic Messages API wire format: interleaved
//! `content_block_start` / `content_block_delta` events instead of OpenAI's
//! `tool_calls` array.
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::{ModelProvider, ResponseStream};
use crate::types::{CompletionRequest, Message, ResponseEvent, Role, ToolDefinition};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        req: CompletionRequest,
    ) -> Result<ResponseStream, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey("anthropic".into()));
        }

        let body = build_request_body(&req);
        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));

        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        // SSE lines can be split across TCP chunks; carry a remainder buffer
        // forward and only parse complete (`\n`-terminated) lines.
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

fn build_request_body(req: &CompletionRequest) -> Value {
    let (system, messages) = build_anthropic_messages(&req.messages);
    let mut body = json!({
        "model": req.model,
        "max_tokens": req.max_tokens,
        "messages": messages,
    });
    if !system.is_empty() {
        body["system"] = json!(system);
    }
    if !req.tools.is_empty() {
        body["tools"] = json!(req.tools.iter().map(tool_to_wire).collect::<Vec<_>>());
    }
    body
}

fn tool_to_wire(t: &ToolDefinition) -> Value {
    json!({
        "name": t.name,
        "description": t.description,
        "input_schema": t.parameters,
    })
}

/// Split a message list into Anthropic's top-level `system` string and the
/// remaining conversation turns, translating tool calls/results to Anthropic's
/// `tool_use` / `tool_result` content-block shape.
fn build_anthropic_messages(messages: &[Message]) -> (String, Vec<Value>) {
    let mut system_parts = Vec::new();
    let mut out = Vec::new();
    for m in messages.iter().filter(|m| m.is_well_formed()) {
        match m.role {
            Role::System => {
                if let Some(text) = &m.content {
                    system_parts.push(text.clone());
                }
            }
            Role::User => {
                out.push(json!({ "role": "user", "content": m.content.clone().unwrap_or_default() }));
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if let Some(text) = &m.content {
                    if !text.is_empty() {
                        content.push(json!({ "type": "text", "text": text }));
                    }
                }
                for tc in &m.tool_calls {
                    let input: Value = serde_json::from_str(&tc.arguments)
                        .unwrap_or_else(|_| Value::Object(Default::default()));
                    content.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": input,
                    }));
                }
                out.push(json!({ "role": "assistant", "content": content }));
            }
            Role::Tool => {
                let tool_use_id = m.tool_call_id.clone().unwrap_or_default();
                out.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": m.content.clone().unwrap_or_default(),
                    }],
                }));
            }
        }
    }
    (system_parts.join("\n\n"), out)
}

fn parse_sse_data_line(line: &str) -> Option<Result<ResponseEvent, ProviderError>> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return Some(Err(ProviderError::ApiRequestFailed(e.to_string()))),
    };
    Some(Ok(parse_anthropic_event(&v)))
}

fn parse_anthropic_event(v: &Value) -> ResponseEvent {
    match v["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let delta = &v["delta"];
            match delta["type"].as_str().unwrap_or("") {
                "text_delta" => ResponseEvent::TextDelta(delta["text"].as_str().unwrap_or("").to_string()),
                "input_json_delta" => ResponseEvent::ToolCall {
                    index,
                    id: String::new(),
                    name: String::new(),
                    arguments: delta["partial_json"].as_str().unwrap_or("").to_string(),
                },
                _ => ResponseEvent::TextDelta(String::new()),
            }
        }
        "content_block_start" => {
            let index = v["index"].as_u64().unwrap_or(0) as u32;
            let block = &v["content_block"];
            if block["type"].as_str() == Some("tool_use") {
                ResponseEvent::ToolCall {
                    index,
                    id: block["id"].as_str().unwrap_or("").to_string(),
                    name: block["name"].as_str().unwrap_or("").to_string(),
                    arguments: String::new(),
                }
            } else {
                ResponseEvent::TextDelta(String::new())
            }
        }
        "message_start" => {
            if let Some(usage) = v["message"].get("usage") {
                ResponseEvent::Usage {
                    input_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                    output_tokens: 0,
                }
            } else {
                ResponseEvent::TextDelta(String::new())
            }
        }
        "message_delta" => {
            if let Some(usage) = v.get("usage") {
                ResponseEvent::Usage {
                    input_tokens: 0,
                    output_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
                }
            } else {
                ResponseEvent::TextDelta(String::new())
            }
        }
        "message_stop" => ResponseEvent::Done,
        _ => ResponseEvent::TextDelta(String::new()),
    }
}

/// Drain all complete `\n`-terminated SSE lines from `buf`, leaving any
/// trailing partial line for the next chunk to complete.
fn drain_complete_sse_lines(buf: &mut String) -> Vec<Result<ResponseEvent, ProviderError>> {
    let mut events = Vec::new();
    while let Some(pos) = buf.find('\n') {
        let line = buf[..pos].trim_end_matches('\r').to_string();
        buf.drain(..=pos);
        if let Some(ev) = parse_sse_data_line(&line) {
            events.push(ev);
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_start_yields_input_usage() {
        let v = json!({
            "type": "message_start",
            "message": { "usage": { "input_tokens": 42 } },
        });
        match parse_anthropic_event(&v) {
            ResponseEvent::Usage { input_tokens, .. } => assert_eq!(input_tokens, 42),
            _ => panic!("expected Usage"),
        }
    }

    #[test]
    fn content_block_delta_text_delta() {
        let v = json!({ "type": "content_block_delta", "delta": { "type": "text_delta", "text": "world" } });
        match parse_anthropic_event(&v) {
            ResponseEvent::TextDelta(s) => assert_eq!(s, "world"),
            _ => panic!("expected TextDelta"),
        }
    }

    #[test]
    fn content_block_start_tool_use_opens_a_tool_call() {
        let v = json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": { "type": "tool_use", "id": "toolu_1", "name": "vector_search" },
        });
        match parse_anthropic_event(&v) {
            ResponseEvent::ToolCall { id, name, .. } => {
                assert_eq!(id, "toolu_1");
                assert_eq!(name, "vector_search");
            }
            _ => panic!("expected ToolCall"),
        }
    }

    #[test]
    fn input_json_delta_streams_partial_arguments() {
        let v = json!({
            "type": "content_block_delta",
            "index": 0,
            "delta": { "type": "input_json_delta", "partial_json": "{\"query\":" },
        });
        match parse_anthropic_event(&v) {
            ResponseEvent::ToolCall { arguments, id, .. } => {
                assert_eq!(arguments, "{\"query\":");
                assert!(id.is_empty());
            }
            _ => panic!("expected ToolCall"),
        }
    }

    #[test]
    fn message_stop_yields_done() {
        assert!(matches!(parse_anthropic_event(&json!({ "type": "message_stop" })), ResponseEvent::Done));
    }

    #[test]
    fn sse_split_across_chunks_reassembles() {
        let mut buf = String::from("data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"tex");
        assert!(drain_complete_sse_lines(&mut buf).is_empty());
        buf.push_str("t\":\"hi\"}}\n");
        let events = drain_complete_sse_lines(&mut buf);
        assert_eq!(events.len(), 1);
        match events.into_iter().next().unwrap().unwrap() {
            ResponseEvent::TextDelta(s) => assert_eq!(s, "hi"),
            _ => panic!("expected TextDelta"),
        }
    }

    #[test]
    fn tool_result_message_becomes_user_tool_result_block() {
        let messages = vec![Message::tool_result("toolu_1", "42 results")];
        let (_, out) = build_anthropic_messages(&messages);
        assert_eq!(out[0]["role"], "user");
        assert_eq!(out[0]["content"][0]["type"], "tool_result");
        assert_eq!(out[0]["content"][0]["tool_use_id"], "toolu_1");
    }

    #[test]
    fn system_messages_are_extracted_separately() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let (system, out) = build_anthropic_messages(&messages);
        assert_eq!(system, "be terse");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["role"], "user");
    }
}
