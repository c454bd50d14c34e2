// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Per-chat agent cache with idle eviction.
//!
//! Keyed by chat id (stringified into a session id). Lookup/insert/evict on
//! the outer map is a short, synchronous critical section guarded by a
//! `std::sync::Mutex`; the `Agent` each entry wraps is itself behind a
//! `tokio::sync::Mutex` so a caller can hold it across the `.await` points
//! of a whole `run()` call. Holding that per-chat lock for the duration of a
//! turn is exactly the "chat id is a critical section" serialization the
//! dispatcher relies on — two messages for the same chat simply queue on the
//! same lock, while messages for different chats never contend.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex as AsyncMutex;
use tracing::info;
use weave_core::Agent;

pub fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// An agent plus the wall-clock time (ms since epoch) it was last handed a
/// message. Bumped after each turn completes, success or failure.
pub struct CachedAgent {
    pub agent: Agent,
    pub last_used_ms: u64,
}

/// The dispatcher's chat-id → agent map, with idle eviction per §4.6.
pub struct SessionCache {
    entries: Mutex<HashMap<String, Arc<AsyncMutex<CachedAgent>>>>,
    max_idle: Duration,
}

impl SessionCache {
    pub fn new(max_idle: Duration) -> Self {
        Self { entries: Mutex::new(HashMap::new()), max_idle }
    }

    /// Return the cached agent for `session_id`, constructing a fresh one
    /// with `build` on first use. `build` is only invoked while the map is
    /// locked and the key is absent, so two concurrent calls for a brand new
    /// chat id never race to build two agents.
    pub fn get_or_create(
        &self,
        session_id: &str,
        build: impl FnOnce() -> Agent,
    ) -> Arc<AsyncMutex<CachedAgent>> {
        let mut guard = self.entries.lock().expect("session cache lock poisoned");
        if let Some(existing) = guard.get(session_id) {
            return existing.clone();
        }
        let wrapped = Arc::new(AsyncMutex::new(CachedAgent { agent: build(), last_used_ms: now_ms() }));
        guard.insert(session_id.to_string(), wrapped.clone());
        wrapped
    }

    /// Remove entries idle for at least `max_idle`. An entry currently held
    /// by an in-flight turn (its inner lock cannot be acquired) is never
    /// evicted regardless of its recorded idle time — `try_lock` failing
    /// means "busy right now", which always wins over a stale timestamp.
    ///
    /// Returns the number of entries evicted.
    pub fn cleanup(&self) -> usize {
        let now = now_ms();
        let max_idle_ms = self.max_idle.as_millis() as u64;
        let mut guard = self.entries.lock().expect("session cache lock poisoned");
        let before = guard.len();
        guard.retain(|session_id, entry| {
            match entry.try_lock() {
                Ok(cached) => {
                    let idle = now.saturating_sub(cached.last_used_ms);
                    let keep = idle < max_idle_ms;
                    if !keep {
                        info!(session_id, idle_ms = idle, "evicting idle telegram session");
                    }
                    keep
                }
                Err(_) => true,
            }
        });
        before - guard.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("session cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
