// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Telegram Bot HTTP API surface the dispatcher needs, behind a trait so
//! the offset-advance invariant and chunking logic can be driven by a mock
//! transport in tests without a real network call.
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::types::{ApiEnvelope, TelegramError, Update};

#[async_trait]
pub trait TelegramTransport: Send + Sync {
    /// Long-poll for new updates starting at `offset`. Telegram holds the
    /// connection open for up to `timeout_secs` before returning an empty
    /// batch if nothing arrived.
    async fn get_updates(&self, offset: u64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError>;

    /// Send a text message to `chat_id`. Callers are responsible for
    /// chunking text longer than the 4096-scalar limit before calling this.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;

    /// Post a `sendChatAction` typing indicator.
    async fn send_typing(&self, chat_id: i64) -> Result<(), TelegramError>;
}

/// Speaks the real Telegram Bot HTTP API over the shared streaming HTTP
/// client. One instance per bot token; cheap to clone (the inner client is
/// reused, not rebuilt per call).
pub struct HttpTelegramTransport {
    client: weave_http::HttpClient,
    bot_token: String,
}

impl HttpTelegramTransport {
    pub fn new(bot_token: impl Into<String>) -> Result<Self, TelegramError> {
        let client = weave_http::HttpClient::new().map_err(TelegramError::from)?;
        Ok(Self { client, bot_token: bot_token.into() })
    }

    fn url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }
}

#[async_trait]
impl<T: TelegramTransport + ?Sized> TelegramTransport for std::sync::Arc<T> {
    async fn get_updates(&self, offset: u64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        (**self).get_updates(offset, timeout_secs).await
    }
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        (**self).send_message(chat_id, text).await
    }
    async fn send_typing(&self, chat_id: i64) -> Result<(), TelegramError> {
        (**self).send_typing(chat_id).await
    }
}

#[async_trait]
impl TelegramTransport for HttpTelegramTransport {
    async fn get_updates(&self, offset: u64, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        // `allowed_updates` restricted to `message` — this runtime does not
        // act on edited messages, callback queries, or channel posts.
        let url = format!(
            "{}?offset={offset}&timeout={timeout_secs}&allowed_updates=%5B%22message%22%5D",
            self.url("getUpdates")
        );
        let resp = self.client.get(&url, &[]).await?;
        if !resp.is_success() {
            return Err(TelegramError::Api(format!("getUpdates http {}", resp.status)));
        }
        let envelope: ApiEnvelope<Vec<Update>> = resp.json().map_err(TelegramError::from)?;
        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope.description.unwrap_or_else(|| "getUpdates returned ok=false".to_string()),
            ));
        }
        Ok(envelope.result.unwrap_or_default())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let url = self.url("sendMessage");
        let body = json!({ "chat_id": chat_id, "text": text });
        let resp = self.client.post_json(&url, &[], &body).await?;
        if !resp.is_success() {
            return Err(TelegramError::Api(format!("sendMessage http {}: {}", resp.status, resp.text())));
        }
        debug!(chat_id, len = text.len(), "sent telegram message");
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TelegramError> {
        let url = self.url("sendChatAction");
        let body = json!({ "chat_id": chat_id, "action": "typing" });
        let resp = self.client.post_json(&url, &[], &body).await?;
        if !resp.is_success() {
            return Err(TelegramError::Api(format!("sendChatAction http {}", resp.status)));
        }
        Ok(())
    }
}
