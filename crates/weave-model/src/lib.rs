// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod anthropic;
mod error;
pub mod mock;
mod openai_compat;
mod provider;
mod retry;
mod types;

pub use anthropic::AnthropicProvider;
pub use error::ProviderError;
pub use openai_compat::OpenAiCompatProvider;
pub use provider::{ModelProvider, ResponseStream};
pub use retry::{backoff_for_attempt, chat_stream_with_retry, MAX_RETRIES};
pub use types::*;

use std::sync::Arc;

use weave_config::Config;

/// Construct the provider for the configured default model.
///
/// Routing is intentionally trivial: a model name containing `"claude"` is
/// dispatched to the Anthropic adapter; everything else goes through the
/// OpenAI-compatible adapter. Which provider's credentials/base URL are used
/// is decided the same way: if the model name contains `"claude"` the
/// `anthropic` provider block is used, otherwise the `openrouter` block is
/// preferred (it fronts most third-party models), falling back to `openai`.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn ModelProvider>> {
    let model = config.agents.defaults.model.clone();
    provider_for_model(config, &model)
}

/// Construct a provider for an arbitrary model name, using the same routing
/// rule as [`from_config`]. Used by tools/subagents that need a model other
/// than the configured default (e.g. the embedding model).
pub fn provider_for_model(config: &Config, model: &str) -> anyhow::Result<Arc<dyn ModelProvider>> {
    if model.contains("claude") {
        let creds = config
            .providers
            .anthropic
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no [providers.anthropic] configured"))?;
        let api_key = creds
            .api_key
            .ok_or_else(|| anyhow::anyhow!("no anthropic api_key configured"))?;
        let base_url = creds
            .api_base
            .unwrap_or_else(|| "https://api.anthropic.com".into());
        return Ok(Arc::new(AnthropicProvider::new(model, api_key, base_url)));
    }

    let (name, creds) = if let Some(creds) = config.providers.openrouter.clone() {
        ("openrouter", creds)
    } else if let Some(creds) = config.providers.openai.clone() {
        ("openai", creds)
    } else if let Some(creds) = config.providers.groq.clone() {
        ("groq", creds)
    } else {
        anyhow::bail!("no OpenAI-compatible provider configured (openrouter/openai/groq)");
    };
    let api_key = creds
        .api_key
        .ok_or_else(|| anyhow::anyhow!("no api_key configured for provider {name}"))?;
    let base_url = creds.api_base.unwrap_or_else(|| match name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    });
    Ok(Arc::new(OpenAiCompatProvider::new(
        name, model, api_key, base_url,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_config::ProviderCreds;

    #[test]
    fn claude_model_routes_to_anthropic() {
        let mut config = Config::default();
        config.agents.defaults.model = "claude-3-5-sonnet-20241022".into();
        config.providers.anthropic = Some(ProviderCreds {
            api_key: Some("sk-ant".into()),
            api_base: None,
        });
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn other_model_routes_to_openai_compat() {
        let mut config = Config::default();
        config.agents.defaults.model = "gpt-4o-mini".into();
        config.providers.openai = Some(ProviderCreds {
            api_key: Some("sk-oai".into()),
            api_base: None,
        });
        let provider = from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let config = Config::default();
        assert!(from_config(&config).is_err());
    }
}
