// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Ties the poller, the per-chat session cache, and the agent loop together.
//!
//! One `Dispatcher` owns the whole bot: it drives the poll loop, fans each
//! incoming message out onto its own task so that a slow model call for one
//! chat never blocks traffic for another, and coordinates shutdown.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{error, info, warn};
use weave_config::Config;
use weave_core::{Agent, AgentEvent, SessionStore};
use weave_memory::VectorStore;
use weave_model::ModelProvider;

use crate::cache::SessionCache;
use crate::chunking::split_into_chunks;
use crate::poller::{run_poll_loop, Poller};
use crate::transport::TelegramTransport;
use crate::types::Update;

/// How often the typing side-channel refreshes the indicator while a reply
/// is in flight.
const TYPING_INTERVAL: Duration = Duration::from_secs(5);

/// Default idle threshold before a cached chat session is evicted.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(30 * 60);

/// How often the background eviction sweep runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub struct Dispatcher<T: TelegramTransport> {
    transport: Arc<T>,
    poller: Arc<Poller<Arc<T>>>,
    cache: Arc<SessionCache>,
    config: Arc<Config>,
    model: Arc<dyn ModelProvider>,
    sessions_dir: std::path::PathBuf,
    vector_store_path: std::path::PathBuf,
    default_chat_id: Option<i64>,
    shutdown: Arc<AtomicBool>,
}

impl<T: TelegramTransport + 'static> Dispatcher<T> {
    pub fn new(
        transport: T,
        config: Arc<Config>,
        model: Arc<dyn ModelProvider>,
        sessions_dir: std::path::PathBuf,
        vector_store_path: std::path::PathBuf,
        default_chat_id: Option<i64>,
    ) -> Self {
        let transport = Arc::new(transport);
        Self {
            poller: Arc::new(Poller::new(transport.clone())),
            transport,
            cache: Arc::new(SessionCache::new(DEFAULT_MAX_IDLE)),
            config,
            model,
            sessions_dir,
            vector_store_path,
            default_chat_id,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run until the shutdown flag is observed. Spawns the poll loop, the
    /// idle-eviction sweep, and a dispatch task per incoming message; joins
    /// all of them before returning so no task is left dangling.
    pub async fn run(&self) {
        let poll_shutdown = self.shutdown.clone();
        let poller = self.poller.clone();
        let dispatch_self = self.clone_handles();

        let poll_task = tokio::spawn(async move {
            run_poll_loop(
                &poller,
                || poll_shutdown.load(Ordering::Relaxed),
                |batch| {
                    for update in batch {
                        dispatch_self.spawn_dispatch(update);
                    }
                },
            )
            .await;
        });

        let cleanup_cache = self.cache.clone();
        let cleanup_shutdown = self.shutdown.clone();
        let cleanup_task = tokio::spawn(async move {
            while !cleanup_shutdown.load(Ordering::Relaxed) {
                tokio::time::sleep(CLEANUP_INTERVAL).await;
                let evicted = cleanup_cache.cleanup();
                if evicted > 0 {
                    info!(evicted, "swept idle telegram sessions");
                }
            }
        });

        let _ = poll_task.await;
        cleanup_task.abort();

        if let Some(chat_id) = self.default_chat_id {
            if let Err(e) = self.transport.send_message(chat_id, "bot is shutting down").await {
                warn!(error = %e, "failed to deliver shutdown notice");
            }
        }
    }

    /// A cheap, cloneable view of the fields a spawned dispatch task needs,
    /// kept separate from `Dispatcher` itself so `run` doesn't need `self`
    /// to be `'static` to move into `tokio::spawn`.
    fn clone_handles(&self) -> DispatchHandles<T> {
        DispatchHandles {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
            model: self.model.clone(),
            sessions_dir: self.sessions_dir.clone(),
            vector_store_path: self.vector_store_path.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

struct DispatchHandles<T: TelegramTransport> {
    transport: Arc<T>,
    cache: Arc<SessionCache>,
    config: Arc<Config>,
    model: Arc<dyn ModelProvider>,
    sessions_dir: std::path::PathBuf,
    vector_store_path: std::path::PathBuf,
    shutdown: Arc<AtomicBool>,
}

// Written by hand instead of `#[derive(Clone)]`: the derive would add a
// spurious `T: Clone` bound even though every field is an `Arc` and clones
// regardless of whether the transport itself implements `Clone`.
impl<T: TelegramTransport> Clone for DispatchHandles<T> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            cache: self.cache.clone(),
            config: self.config.clone(),
            model: self.model.clone(),
            sessions_dir: self.sessions_dir.clone(),
            vector_store_path: self.vector_store_path.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<T: TelegramTransport + 'static> DispatchHandles<T> {
    fn spawn_dispatch(&self, update: Update) {
        let Some(message) = update.message else { return };
        let Some(text) = message.text else { return };
        let chat_id = message.chat.id;
        let handles = self.clone();
        tokio::spawn(async move { handles.handle_message(chat_id, text).await });
    }

    fn build_agent(&self, session_id: &str) -> Agent {
        let session_store = SessionStore::new(self.sessions_dir.clone());
        let vector_store = VectorStore::load(self.vector_store_path.clone()).unwrap_or_default();
        let vector_store = Arc::new(tokio::sync::RwLock::new(vector_store));
        let mut agent =
            Agent::new(self.config.clone(), session_id.to_string(), self.model.clone(), session_store, vector_store)
                .expect("agent construction should not fail with a validated config");
        agent.set_shutdown_flag(self.shutdown.clone());
        agent
    }

    /// Serialize all turns for one chat id through its cached agent, stream
    /// a typing indicator while the model works, and relay the final reply
    /// back in chunks. Any agent error is logged and answered with a short
    /// apology sent directly to the offending chat, per the user-visible
    /// error-handling contract every front-end follows.
    async fn handle_message(&self, chat_id: i64, text: String) {
        let session_id = chat_id.to_string();
        let cache = self.cache.clone();
        let entry = {
            let session_id = session_id.clone();
            let handles = self.clone();
            cache.get_or_create(&session_id, move || handles.build_agent(&session_id))
        };
        let mut cached = entry.lock().await;

        let (typing_done_tx, typing_done_rx) = oneshot::channel();
        let typing_handle = spawn_typing_indicator(self.transport.clone(), chat_id, typing_done_rx);

        let mut reply = String::new();
        let mut errored = false;
        let result = cached
            .agent
            .run(text, &mut |event| match event {
                AgentEvent::TextDelta(delta) => reply.push_str(&delta),
                AgentEvent::Error(msg) => {
                    errored = true;
                    warn!(chat_id, error = %msg, "agent turn reported an error");
                }
                AgentEvent::Interrupted => {
                    info!(chat_id, "agent turn interrupted by shutdown");
                }
                _ => {}
            })
            .await;

        let _ = typing_done_tx.send(());
        let _ = typing_handle.await;

        cached.last_used_ms = crate::cache::now_ms();
        drop(cached);

        if let Err(e) = result {
            error!(chat_id, error = %e, "agent turn failed");
            let _ = self.transport.send_message(chat_id, "Sorry, something went wrong handling that.").await;
            return;
        }
        if errored && reply.is_empty() {
            let _ = self.transport.send_message(chat_id, "Sorry, something went wrong handling that.").await;
            return;
        }
        if reply.is_empty() {
            return;
        }

        for chunk in split_into_chunks(&reply) {
            if let Err(e) = self.transport.send_message(chat_id, &chunk).await {
                warn!(chat_id, error = %e, "failed to deliver reply chunk");
                break;
            }
        }
    }
}

fn spawn_typing_indicator<T: TelegramTransport + 'static>(
    transport: Arc<T>,
    chat_id: i64,
    mut done: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = transport.send_typing(chat_id).await {
                warn!(chat_id, error = %e, "failed to post typing indicator");
            }
            tokio::select! {
                _ = tokio::time::sleep(TYPING_INTERVAL) => {}
                _ = &mut done => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use weave_model::mock::ScriptedMockProvider;
    use crate::types::{Chat, IncomingMessage, TelegramError};

    #[derive(Clone)]
    struct RecordingTransport {
        sent: Arc<StdMutex<Vec<(i64, String)>>>,
        typing: Arc<StdMutex<usize>>,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self { sent: Arc::new(StdMutex::new(Vec::new())), typing: Arc::new(StdMutex::new(0)) }
        }
    }

    #[async_trait]
    impl TelegramTransport for RecordingTransport {
        async fn get_updates(&self, _offset: u64, _timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
            Ok(Vec::new())
        }
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
        async fn send_typing(&self, _chat_id: i64) -> Result<(), TelegramError> {
            *self.typing.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_text_message_is_answered_and_chunked_if_needed() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RecordingTransport::new();
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("pong"));
        let dispatcher = Dispatcher::new(
            transport.clone(),
            Arc::new(Config::default()),
            model,
            dir.path().join("sessions"),
            dir.path().join("memory.json"),
            None,
        );

        let handles = dispatcher.clone_handles();
        let update = Update {
            update_id: 1,
            message: Some(IncomingMessage { chat: Chat { id: 42 }, text: Some("ping".into()) }),
        };
        handles.spawn_dispatch(update);

        // Give the spawned task a chance to run to completion.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (42, "pong".to_string()));
    }

    #[tokio::test]
    async fn a_message_with_no_text_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RecordingTransport::new();
        let model: Arc<dyn ModelProvider> = Arc::new(ScriptedMockProvider::always_text("pong"));
        let dispatcher = Dispatcher::new(
            transport.clone(),
            Arc::new(Config::default()),
            model,
            dir.path().join("sessions"),
            dir.path().join("memory.json"),
            None,
        );
        let handles = dispatcher.clone_handles();
        let update = Update { update_id: 1, message: Some(IncomingMessage { chat: Chat { id: 42 }, text: None }) };
        handles.spawn_dispatch(update);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.sent.lock().unwrap().is_empty());
    }
}
