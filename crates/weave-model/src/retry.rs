// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;
use crate::provider::ModelProvider;
use crate::{CompletionRequest, LlmResponse, ResponseEvent};

/// Maximum number of attempts (the first call plus two retries).
pub const MAX_RETRIES: u32 = 3;

/// Capped exponential backoff for attempt `n` (0-indexed): 2s, 4s, 8s.
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt + 1))
}

/// Drive `provider.chat_stream` with the classified retry policy: transient
/// errors (`ServiceUnavailable`, `ApiRequestFailed`, `Network`) are retried
/// with capped exponential backoff up to `MAX_RETRIES` attempts; all other
/// kinds surface immediately. Exhausting retries returns `NetworkRetryFailed`.
pub async fn chat_stream_with_retry<P: ModelProvider + ?Sized>(
    provider: &P,
    req: CompletionRequest,
    mut on_chunk: impl FnMut(&ResponseEvent) + Send,
) -> Result<LlmResponse, ProviderError> {
    let mut last_err: Option<ProviderError> = None;
    for attempt in 0..MAX_RETRIES {
        match provider.chat_stream(req.clone(), &mut on_chunk).await {
            Ok(resp) => return Ok(resp),
            Err(err) if err.is_retryable() => {
                warn!(attempt, error = %err, "transient provider error, retrying");
                last_err = Some(err);
                if attempt + 1 < MAX_RETRIES {
                    tokio::time::sleep(backoff_for_attempt(attempt)).await;
                }
            }
            Err(err) => return Err(err),
        }
    }
    Err(ProviderError::NetworkRetryFailed(
        last_err.map(|e| e.to_string()).unwrap_or_else(|| "retries exhausted".into()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence_is_2_4_8_seconds() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn rate_limit_is_not_retried() {
        use crate::mock::FailingMockProvider;
        let provider = FailingMockProvider::always(ProviderError::RateLimitExceeded);
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };
        let result = chat_stream_with_retry(&provider, req, |_| {}).await;
        assert!(matches!(result, Err(ProviderError::RateLimitExceeded)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_recover_succeeds_on_third_attempt() {
        use crate::mock::FailingMockProvider;
        let provider = FailingMockProvider::fail_n_times_then_succeed(2, "ok");
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };
        let result = chat_stream_with_retry(&provider, req, |_| {}).await.unwrap();
        assert_eq!(result.content.as_deref(), Some("ok"));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_returns_network_retry_failed() {
        use crate::mock::FailingMockProvider;
        let provider = FailingMockProvider::always(ProviderError::Network("reset".into()));
        let req = CompletionRequest { model: "mock".into(), messages: vec![], tools: vec![], max_tokens: 100 };
        let result = chat_stream_with_retry(&provider, req, |_| {}).await;
        assert!(matches!(result, Err(ProviderError::NetworkRetryFailed(_))));
        assert_eq!(provider.call_count(), MAX_RETRIES);
    }
}
