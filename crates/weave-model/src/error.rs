// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// Closed set of provider-facing error kinds. Adapters classify every failure
/// into one of these so the retry engine can decide, without inspecting
/// provider-specific error bodies, whether to back off and try again.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("no API key configured for provider {0}")]
    NoApiKey(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("model does not support tool use: {0}")]
    ModelNotSupported(String),

    #[error("upstream service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("API request failed: {0}")]
    ApiRequestFailed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("retries exhausted: {0}")]
    NetworkRetryFailed(String),
}

impl ProviderError {
    /// Whether the retry engine should back off and try again, per the
    /// closed retry-policy table: `ServiceUnavailable`, `ApiRequestFailed`,
    /// and `Network` are transient; everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::ServiceUnavailable(_)
                | ProviderError::ApiRequestFailed(_)
                | ProviderError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_not_retryable() {
        assert!(!ProviderError::RateLimitExceeded.is_retryable());
    }

    #[test]
    fn no_api_key_is_not_retryable() {
        assert!(!ProviderError::NoApiKey("openai".into()).is_retryable());
    }

    #[test]
    fn model_not_supported_is_not_retryable() {
        assert!(!ProviderError::ModelNotSupported("gpt-3".into()).is_retryable());
    }

    #[test]
    fn service_unavailable_is_retryable() {
        assert!(ProviderError::ServiceUnavailable("503".into()).is_retryable());
    }

    #[test]
    fn network_is_retryable() {
        assert!(ProviderError::Network("reset".into()).is_retryable());
    }

    #[test]
    fn api_request_failed_is_retryable() {
        assert!(ProviderError::ApiRequestFailed("400".into()).is_retryable());
    }
}
