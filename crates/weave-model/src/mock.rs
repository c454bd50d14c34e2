// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::error::ProviderError;
use crate::provider::{ModelProvider, ResponseStream};
use crate::{CompletionRequest, ResponseEvent, ToolCall};

/// A provider whose responses are pre-scripted: each call to
/// `stream_completion` pops the next script off the front of the queue. Used
/// to drive deterministic multi-turn agent tests (tool-call-then-text turns,
/// iteration-cap exhaustion, etc.) without a network dependency.
pub struct ScriptedMockProvider {
    scripts: Mutex<Vec<Vec<ResponseEvent>>>,
    name: String,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Vec<ResponseEvent>>) -> Self {
        Self { scripts: Mutex::new(scripts), name: "mock".into() }
    }

    /// A script that always returns the same single tool call, for every
    /// call made to this provider (used to exercise the iteration cap).
    pub fn always_same_tool_call(id: &str, name: &str, arguments: &str) -> Self {
        let call = vec![
            ResponseEvent::ToolCall { index: 0, id: id.into(), name: name.into(), arguments: arguments.into() },
            ResponseEvent::Done,
        ];
        Self { scripts: Mutex::new(vec![call]), name: "mock".into() }
    }

    pub fn tool_then_text(tool_id: &str, tool_name: &str, args_json: &str, final_text: &str) -> Self {
        let scripts = vec![
            vec![
                ResponseEvent::ToolCall { index: 0, id: tool_id.into(), name: tool_name.into(), arguments: args_json.into() },
                ResponseEvent::Done,
            ],
            vec![ResponseEvent::TextDelta(final_text.into()), ResponseEvent::Done],
        ];
        Self { scripts: Mutex::new(scripts), name: "mock".into() }
    }

    pub fn always_text(reply: &str) -> Self {
        Self { scripts: Mutex::new(vec![vec![ResponseEvent::TextDelta(reply.into()), ResponseEvent::Done]]), name: "mock".into() }
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn stream_completion(&self, _req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let mut scripts = self.scripts.lock().unwrap();
        let events = if scripts.len() > 1 {
            scripts.remove(0)
        } else if let Some(last) = scripts.last() {
            // Repeat the final (or only) script indefinitely — supports the
            // iteration-cap scenario, which needs the same tool call every turn.
            last.clone()
        } else {
            vec![ResponseEvent::TextDelta("[no more scripts]".into()), ResponseEvent::Done]
        };
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

/// A provider used to exercise the retry engine: configurable to fail a fixed
/// number of times with a given error before succeeding, or to fail forever.
pub struct FailingMockProvider {
    fail_times: usize,
    error: ProviderError,
    success_text: String,
    calls: AtomicUsize,
    name: String,
}

impl FailingMockProvider {
    pub fn always(error: ProviderError) -> Self {
        Self { fail_times: usize::MAX, error, success_text: String::new(), calls: AtomicUsize::new(0), name: "mock".into() }
    }

    pub fn fail_n_times_then_succeed(n: usize, success_text: &str) -> Self {
        Self {
            fail_times: n,
            error: ProviderError::Network("simulated".into()),
            success_text: success_text.into(),
            calls: AtomicUsize::new(0),
            name: "mock".into(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn clone_error(&self) -> ProviderError {
        match &self.error {
            ProviderError::NoApiKey(s) => ProviderError::NoApiKey(s.clone()),
            ProviderError::RateLimitExceeded => ProviderError::RateLimitExceeded,
            ProviderError::ModelNotSupported(s) => ProviderError::ModelNotSupported(s.clone()),
            ProviderError::ServiceUnavailable(s) => ProviderError::ServiceUnavailable(s.clone()),
            ProviderError::ApiRequestFailed(s) => ProviderError::ApiRequestFailed(s.clone()),
            ProviderError::Network(s) => ProviderError::Network(s.clone()),
            ProviderError::NetworkRetryFailed(s) => ProviderError::NetworkRetryFailed(s.clone()),
        }
    }
}

#[async_trait]
impl ModelProvider for FailingMockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn stream_completion(&self, _req: CompletionRequest) -> Result<ResponseStream, ProviderError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_index < self.fail_times {
            return Err(self.clone_error());
        }
        let events = vec![ResponseEvent::TextDelta(self.success_text.clone()), ResponseEvent::Done];
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_single_text_reply() {
        let provider = ScriptedMockProvider::always_text("hello there");
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };
        let resp = provider.chat_stream(req, &mut |_| {}).await.unwrap();
        assert_eq!(resp.content.as_deref(), Some("hello there"));
        assert!(!resp.has_tool_calls());
    }

    #[tokio::test]
    async fn scripted_tool_then_text_two_rounds() {
        let provider = ScriptedMockProvider::tool_then_text("c1", "vector_search", "{}", "done");
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };

        let first = provider.chat_stream(req.clone(), &mut |_| {}).await.unwrap();
        assert!(first.has_tool_calls());
        assert_eq!(first.tool_calls[0].name, "vector_search");

        let second = provider.chat_stream(req, &mut |_| {}).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn always_same_tool_call_repeats_indefinitely() {
        let provider = ScriptedMockProvider::always_same_tool_call("c1", "vector_search", "{}");
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };
        for _ in 0..10 {
            let resp = provider.chat_stream(req.clone(), &mut |_| {}).await.unwrap();
            assert!(resp.has_tool_calls());
        }
    }

    #[test]
    fn tool_call_struct_is_trivially_constructed() {
        let call = ToolCall { id: "1".into(), name: "f".into(), arguments: "{}".into() };
        assert_eq!(call.id, "1");
    }
}
