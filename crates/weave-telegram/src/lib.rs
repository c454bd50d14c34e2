// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Telegram long-poll ingest/dispatch engine.
pub mod cache;
pub mod chunking;
pub mod dispatcher;
pub mod poller;
pub mod transport;
pub mod types;

pub use cache::SessionCache;
pub use dispatcher::{Dispatcher, DEFAULT_MAX_IDLE};
pub use poller::Poller;
pub use transport::{HttpTelegramTransport, TelegramTransport};
pub use types::{Chat, IncomingMessage, TelegramError, Update};
