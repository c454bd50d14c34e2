// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Root configuration document, loaded from a single JSON file.
///
/// Unlike the multi-file layered configs this workspace is descended from,
/// this shape is deliberately flat: one file, no merging, no profiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsSection {
    #[serde(default)]
    pub defaults: AgentDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Model identifier passed straight through to the provider adapter,
    /// e.g. `"gpt-4o-mini"` or `"claude-3-5-sonnet-20241022"`.
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub disable_rag: bool,
    #[serde(default)]
    pub load_chat_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chat_history: Option<usize>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            embedding_model: None,
            disable_rag: false,
            load_chat_history: false,
            max_chat_history: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<ProviderCreds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<ProviderCreds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderCreds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groq: Option<ProviderCreds>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCreds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<WebConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<WebSearchConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}
