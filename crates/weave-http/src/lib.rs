// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! A thin streaming HTTP client wrapping `reqwest`/`rustls`.
//!
//! Provider adapters in `weave-model` talk to `reqwest` directly — they
//! were already written and tested against it before this crate existed,
//! and their wire formats differ enough per-provider that a shared client
//! would buy little. This crate is instead the HTTP surface for front
//! ends that need a plain buffered call or a chunked read without
//! provider-specific SSE framing, starting with the Telegram dispatcher's
//! long polling.
mod client;
mod error;

pub use client::{ByteStream, HttpClient, HttpResponse, RateLimitHeaders};
pub use error::HttpError;
