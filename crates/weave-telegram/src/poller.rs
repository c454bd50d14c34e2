// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Offset bookkeeping for Telegram's long-poll `getUpdates` call.
//!
//! Telegram acknowledges delivery implicitly: sending a later `offset` tells
//! it everything below that id was handled and need not be redelivered.
//! There is exactly one writer of `next_offset` (the poll loop itself, never
//! the dispatch side), so it is `AtomicU64` purely so the current value can
//! be read for telemetry without taking a lock — not because of concurrent
//! writers.
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::transport::TelegramTransport;
use crate::types::{TelegramError, Update};

/// How long Telegram is asked to hold a `getUpdates` connection open before
/// returning an empty batch.
pub const LONG_POLL_TIMEOUT_SECS: u64 = 5;

pub struct Poller<T: TelegramTransport> {
    transport: T,
    next_offset: AtomicU64,
}

impl<T: TelegramTransport> Poller<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, next_offset: AtomicU64::new(0) }
    }

    /// Current offset that will be sent on the next poll. Exposed for
    /// status reporting only.
    pub fn current_offset(&self) -> u64 {
        self.next_offset.load(Ordering::Relaxed)
    }

    /// Block for up to [`LONG_POLL_TIMEOUT_SECS`] waiting for new updates,
    /// and on success advance the offset past the highest `update_id`
    /// returned. On a transport error the offset is left untouched so the
    /// same batch is requested again next time — an error here must never
    /// look like "these updates were delivered".
    pub async fn poll_once(&self) -> Result<Vec<Update>, TelegramError> {
        let offset = self.current_offset();
        let updates = self.transport.get_updates(offset, LONG_POLL_TIMEOUT_SECS).await?;
        if let Some(max_id) = updates.iter().map(|u| u.update_id).max() {
            self.next_offset.store(max_id + 1, Ordering::Relaxed);
        }
        Ok(updates)
    }
}

/// Run `poll_once` in a loop, invoking `on_batch` for every non-empty
/// result. Stops as soon as `should_stop` returns `true`, checked between
/// polls (never mid-poll — a long-poll call already in flight runs to
/// completion, matching the agent's own cooperative-shutdown discipline).
/// A transport error is logged and followed by a short backoff rather than
/// propagated, since a single flaky poll should never take the whole
/// dispatcher down.
pub async fn run_poll_loop<T, F>(
    poller: &Poller<T>,
    mut should_stop: impl FnMut() -> bool,
    mut on_batch: F,
) where
    T: TelegramTransport,
    F: FnMut(Vec<Update>),
{
    while !should_stop() {
        match poller.poll_once().await {
            Ok(updates) => {
                if !updates.is_empty() {
                    on_batch(updates);
                }
            }
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }
    }
}
