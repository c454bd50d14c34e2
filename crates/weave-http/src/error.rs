// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced by the streaming HTTP client. Kept small and
/// provider-agnostic — callers (provider adapters, the Telegram client)
/// layer their own classification on top of this.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("connect/request error: {0}")]
    Network(String),

    #[error("timed out waiting for the next chunk")]
    ReadTimeout,

    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),
}
