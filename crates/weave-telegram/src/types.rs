// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::Deserialize;
use thiserror::Error;

/// One entry from `getUpdates`. Only the fields the dispatcher reads are
/// modeled — Telegram's update object carries many more (`edited_message`,
/// `callback_query`, …) that this runtime does not act on.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: u64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Envelope every Telegram Bot API response is wrapped in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub ok: bool,
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("telegram API error: {0}")]
    Api(String),
}

impl From<weave_http::HttpError> for TelegramError {
    fn from(e: weave_http::HttpError) -> Self {
        match e {
            weave_http::HttpError::Decode(msg) => TelegramError::Decode(msg),
            other => TelegramError::Network(other.to_string()),
        }
    }
}
