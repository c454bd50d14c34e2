// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use weave_config::Config;
use weave_memory::VectorStore;
use weave_model::{chat_stream_with_retry, CompletionRequest, Message, ModelProvider, ProviderError};
use weave_tools::{ToolCtx, ToolRegistry};

use crate::events::AgentEvent;
use crate::session::{Session, SessionStore};

/// Minimum length (in bytes) a turn's text must reach before it is worth
/// indexing into semantic memory. Shorter exchanges ("ok", "thanks") are
/// almost never useful to recall later and would otherwise dominate search
/// results by sheer count.
const MIN_INDEXABLE_LEN: usize = 10;

/// Hard cap on the number of model turns a single `run()` call may take
/// before giving up. Prevents a tool-call loop (the model repeatedly
/// requesting the same tool) from running forever.
pub const MAX_ITERATIONS: usize = 10;

/// From this many completed iterations onward, a warning is folded into the
/// request sent to the model so it has a chance to wrap up before the cap is
/// hit. It is never added to the persisted session — only to the messages
/// actually sent for that one request.
const LOOP_WARNING_FROM_ITERATION: usize = 2;

const LOOP_WARNING: &str = "You are approaching the maximum number of tool-call rounds for this turn. Finish up and respond to the user directly.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Drives one conversation: a bounded ReAct loop (model turn, optional tool
/// calls, repeat) around a single provider and tool registry.
pub struct Agent {
    session: Session,
    tools: Arc<ToolRegistry>,
    tool_ctx: ToolCtx,
    model: Arc<dyn ModelProvider>,
    session_store: SessionStore,
    vector_store: Arc<RwLock<VectorStore>>,
    disable_rag: bool,
    shutdown: Arc<AtomicBool>,
}

impl Agent {
    /// Build an agent for `session_id`, optionally reloading prior history
    /// per `config.agents.defaults.load_chat_history` /
    /// `max_chat_history`, and registering the local memory tools unless
    /// `disable_rag` is set.
    pub fn new(
        config: Arc<Config>,
        session_id: impl Into<String>,
        model: Arc<dyn ModelProvider>,
        session_store: SessionStore,
        vector_store: Arc<RwLock<VectorStore>>,
    ) -> Result<Self, AgentError> {
        let session_id = session_id.into();
        let defaults = config.agents.defaults.clone();

        let mut session = Session::new(session_id.clone());
        if defaults.load_chat_history {
            if let Some(mut messages) = session_store.load(&session_id)? {
                if let Some(max) = defaults.max_chat_history {
                    if messages.len() > max {
                        messages = messages.split_off(messages.len() - max);
                    }
                }
                session.push_many(messages);
            }
        }

        let mut tools = ToolRegistry::new();
        if !defaults.disable_rag {
            tools.register(Arc::new(weave_tools::VectorUpsertTool));
            tools.register(Arc::new(weave_tools::VectorSearchTool));
        }
        let tools = Arc::new(tools);

        let tool_ctx = ToolCtx::new(config, vector_store.clone());

        let mut agent = Self {
            session,
            tools,
            tool_ctx,
            model,
            session_store,
            vector_store,
            disable_rag: defaults.disable_rag,
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        // A session reloaded from disk already carries its own system
        // message as the first entry; only a brand-new session needs one
        // synthesized, and it is pushed exactly once so the persisted
        // transcript genuinely reflects what was sent to the model.
        if agent.session.messages.is_empty() {
            let system_message = agent.system_message();
            agent.session.push(system_message);
        }

        Ok(agent)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Share a shutdown flag with this agent. The run loop checks it at the
    /// start of every iteration and stops cooperatively rather than
    /// cancelling an in-flight provider call.
    pub fn set_shutdown_flag(&mut self, flag: Arc<AtomicBool>) {
        self.shutdown = flag;
    }

    fn system_message(&self) -> Message {
        let tool_names = self.tools.names().join(", ");
        let text = if tool_names.is_empty() {
            "You are a helpful assistant. No tools are available this turn.".to_string()
        } else {
            format!("You are a helpful assistant. Available tools: {tool_names}.")
        };
        Message::system(text)
    }

    /// Upsert the just-completed exchange into local semantic memory, unless
    /// RAG is disabled for this agent or the exchange is too short to be
    /// worth recalling later. Grounded in the same embed-then-store path the
    /// `vector_upsert` tool uses, called directly rather than through the
    /// tool registry since this isn't a model-requested action.
    async fn index_conversation(&self, user_text: &str, assistant_text: &str) {
        if self.disable_rag {
            return;
        }
        if self.tool_ctx.embedding_model_supported().is_err() {
            return;
        }
        let combined = format!("{user_text}\n{assistant_text}");
        if combined.len() < MIN_INDEXABLE_LEN {
            return;
        }

        let embedding = weave_memory::embed(&combined);
        let mut store = self.vector_store.write().await;
        store.upsert(&combined, embedding);
        if let Err(e) = store.save() {
            warn!(error = %e, "failed to persist vector store after indexing conversation");
        }
    }

    /// Append the user's message and run the bounded ReAct loop until the
    /// model produces a turn with no further tool calls, or `MAX_ITERATIONS`
    /// is reached. Streams `AgentEvent`s to `on_event` as they occur and
    /// saves the session once the turn concludes.
    pub async fn run(
        &mut self,
        user_input: impl Into<String>,
        on_event: &mut (dyn FnMut(AgentEvent) + Send),
    ) -> Result<(), AgentError> {
        let user_text = user_input.into();
        self.session.push(Message::user(user_text.clone()));

        for iteration in 0..MAX_ITERATIONS {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!(iteration, "shutdown flag observed, stopping before next model turn");
                self.session_store.save(&self.session.id, &self.session.messages)?;
                on_event(AgentEvent::Interrupted);
                return Ok(());
            }

            let mut messages: Vec<Message> =
                self.session.messages.iter().filter(|m| m.is_well_formed()).cloned().collect();
            if iteration >= LOOP_WARNING_FROM_ITERATION {
                messages.push(Message::system(LOOP_WARNING));
            }

            debug!(iteration, message_count = messages.len(), "starting model turn");

            let request = CompletionRequest {
                model: self.model.model_name().to_string(),
                messages,
                tools: self.tools.schemas(),
                max_tokens: 4096,
            };

            let response = match chat_stream_with_retry(&*self.model, request, |event| {
                if let weave_model::ResponseEvent::TextDelta(delta) = event {
                    on_event(AgentEvent::TextDelta(delta.clone()));
                }
            })
            .await
            {
                Ok(r) => r,
                Err(e) => {
                    warn!(iteration, error = %e, "model turn failed");
                    on_event(AgentEvent::Error(e.to_string()));
                    return Err(e.into());
                }
            };

            if !response.has_tool_calls() {
                let assistant_text = response.content.unwrap_or_default();
                if !assistant_text.is_empty() {
                    self.session.push(Message::assistant_text(assistant_text.clone()));
                    self.index_conversation(&user_text, &assistant_text).await;
                }
                self.session_store.save(&self.session.id, &self.session.messages)?;
                on_event(AgentEvent::TurnComplete);
                return Ok(());
            }

            self.session
                .push(Message::assistant_tool_calls(response.content, response.tool_calls.clone()));

            for call in &response.tool_calls {
                on_event(AgentEvent::ToolCallStarted(call.clone()));
                let output = self.tools.execute(&self.tool_ctx, call).await;
                let is_error = output.starts_with("Error");
                on_event(AgentEvent::ToolCallFinished {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    output: output.clone(),
                    is_error,
                });
                self.session.push(Message::tool_result(call.id.clone(), output));
            }
        }

        self.session_store.save(&self.session.id, &self.session.messages)?;
        on_event(AgentEvent::Error(format!(
            "reached the maximum of {MAX_ITERATIONS} tool-call rounds without a final reply"
        )));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::mock::ScriptedMockProvider;

    fn test_agent(model: Arc<dyn ModelProvider>, dir: &std::path::Path) -> Agent {
        let config = Arc::new(Config::default());
        let session_store = SessionStore::new(dir.join("sessions"));
        let vector_store = Arc::new(RwLock::new(VectorStore::load(dir.join("memory.json")).unwrap()));
        Agent::new(config, "test-session", model, session_store, vector_store).unwrap()
    }

    #[tokio::test]
    async fn simple_text_reply_completes_in_one_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("hello!"));
        let mut agent = test_agent(model, dir.path());

        let mut events = Vec::new();
        agent.run("hi", &mut |e| events.push(e)).await.unwrap();

        assert!(matches!(events.last(), Some(AgentEvent::TurnComplete)));
        assert_eq!(agent.session().messages.last().unwrap().as_text(), Some("hello!"));
    }

    #[tokio::test]
    async fn tool_call_then_text_runs_two_turns_and_records_both() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::tool_then_text(
            "c1",
            "vector_search",
            r#"{"query":"x"}"#,
            "found it",
        ));
        let mut agent = test_agent(model, dir.path());

        let mut events = Vec::new();
        agent.run("search for x", &mut |e| events.push(e)).await.unwrap();

        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallStarted(_))));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallFinished { .. })));
        assert!(matches!(events.last(), Some(AgentEvent::TurnComplete)));
        assert_eq!(agent.session().messages.last().unwrap().as_text(), Some("found it"));
    }

    #[tokio::test]
    async fn runaway_tool_calls_stop_at_max_iterations() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_same_tool_call("c1", "vector_search", "{}"));
        let mut agent = test_agent(model, dir.path());

        let mut events = Vec::new();
        agent.run("loop forever", &mut |e| events.push(e)).await.unwrap();

        let tool_call_count = events.iter().filter(|e| matches!(e, AgentEvent::ToolCallStarted(_))).count();
        assert_eq!(tool_call_count, MAX_ITERATIONS);
        assert!(matches!(events.last(), Some(AgentEvent::Error(_))));
    }

    #[tokio::test]
    async fn session_is_persisted_after_a_completed_turn() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("saved reply"));
        let mut agent = test_agent(model, dir.path());
        agent.run("hi", &mut |_| {}).await.unwrap();

        let store = SessionStore::new(dir.path().join("sessions"));
        let loaded = store.load("test-session").unwrap().unwrap();
        assert_eq!(loaded.last().unwrap().as_text(), Some("saved reply"));
    }

    #[tokio::test]
    async fn malformed_empty_assistant_messages_are_filtered_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("ok"));
        let mut agent = test_agent(model, dir.path());
        agent.session.push(Message::assistant_tool_calls(None, vec![]));
        agent.run("hi", &mut |_| {}).await.unwrap();
        assert_eq!(agent.session().messages.last().unwrap().as_text(), Some("ok"));
    }

    #[tokio::test]
    async fn disable_rag_registers_no_tools() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.agents.defaults.disable_rag = true;
        let config = Arc::new(config);
        let session_store = SessionStore::new(dir.path().join("sessions"));
        let vector_store = Arc::new(RwLock::new(VectorStore::load(dir.path().join("memory.json")).unwrap()));
        let model = Arc::new(ScriptedMockProvider::always_text("ok"));
        let agent = Agent::new(config, "s", model, session_store, vector_store).unwrap();
        assert!(agent.tools.names().is_empty());
    }

    #[tokio::test]
    async fn persisted_session_begins_with_the_system_message() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("hello!"));
        let mut agent = test_agent(model, dir.path());
        agent.run("hi", &mut |_| {}).await.unwrap();

        let store = SessionStore::new(dir.path().join("sessions"));
        let loaded = store.load("test-session").unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].role, weave_model::Role::System);
        assert_eq!(loaded[1].role, weave_model::Role::User);
        assert_eq!(loaded[2].role, weave_model::Role::Assistant);
    }

    #[tokio::test]
    async fn reloading_a_session_does_not_duplicate_the_system_message() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("first reply"));
        let mut agent = test_agent(model, dir.path());
        agent.run("hi", &mut |_| {}).await.unwrap();
        drop(agent);

        let mut config = Config::default();
        config.agents.defaults.load_chat_history = true;
        let config = Arc::new(config);
        let session_store = SessionStore::new(dir.path().join("sessions"));
        let vector_store = Arc::new(RwLock::new(VectorStore::load(dir.path().join("memory.json")).unwrap()));
        let model = Arc::new(ScriptedMockProvider::always_text("second reply"));
        let mut reloaded =
            Agent::new(config, "test-session", model, session_store, vector_store).unwrap();
        reloaded.run("again", &mut |_| {}).await.unwrap();

        let system_count = reloaded.session().messages.iter().filter(|m| m.role == weave_model::Role::System).count();
        assert_eq!(system_count, 1);
    }

    #[tokio::test]
    async fn shutdown_flag_interrupts_before_the_next_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_same_tool_call("c1", "vector_search", "{}"));
        let mut agent = test_agent(model, dir.path());
        let shutdown = Arc::new(AtomicBool::new(true));
        agent.set_shutdown_flag(shutdown);

        let mut events = Vec::new();
        agent.run("loop forever", &mut |e| events.push(e)).await.unwrap();

        assert!(matches!(events.last(), Some(AgentEvent::Interrupted)));
        assert!(events.iter().all(|e| !matches!(e, AgentEvent::ToolCallStarted(_))));
    }

    #[tokio::test]
    async fn completed_turns_are_indexed_into_semantic_memory() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("the answer is forty-two"));
        let mut agent = test_agent(model, dir.path());
        agent.run("what is the answer to everything", &mut |_| {}).await.unwrap();

        let store = agent.vector_store.read().await;
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn very_short_turns_are_not_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let model = Arc::new(ScriptedMockProvider::always_text("ok"));
        let mut agent = test_agent(model, dir.path());
        agent.run("hi", &mut |_| {}).await.unwrap();

        let store = agent.vector_store.read().await;
        assert!(store.is_empty());
    }
}
