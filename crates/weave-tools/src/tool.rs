// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use weave_config::Config;
use weave_memory::VectorStore;

/// Everything a built-in tool needs besides its own arguments: the active
/// config and a handle to the local vector store. The store is behind a
/// `tokio::sync::RwLock` rather than a plain mutex: searches (reads) are far
/// more frequent than upserts (writes) and should be able to overlap.
/// `get_embeddings` and `spawn_subagent` are injected rather than called
/// directly so that tools never depend on `weave-memory` or a subagent
/// runtime concretely — only on this context.
#[derive(Clone)]
pub struct ToolCtx {
    pub config: Arc<Config>,
    pub vector_store: Arc<RwLock<VectorStore>>,
    pub get_embeddings: Arc<dyn Fn(&[String]) -> Vec<Vec<f32>> + Send + Sync>,
    pub spawn_subagent: Arc<dyn Fn(&str, &str) -> String + Send + Sync>,
}

impl ToolCtx {
    pub fn new(config: Arc<Config>, vector_store: Arc<RwLock<VectorStore>>) -> Self {
        Self {
            config,
            vector_store,
            get_embeddings: Arc::new(|texts: &[String]| {
                texts.iter().map(|t| weave_memory::embed(t)).collect()
            }),
            spawn_subagent: Arc::new(|_task: &str, _label: &str| {
                "subagent spawning is not implemented in this runtime".to_string()
            }),
        }
    }

    /// `None` or `"local"` means the deterministic offline embedder; any
    /// other value names a remote embedding model this runtime does not
    /// speak to, and memory tools should refuse rather than silently
    /// embedding with the wrong model.
    pub fn embedding_model_supported(&self) -> Result<(), ToolError> {
        match self.config.agents.defaults.embedding_model.as_deref() {
            None | Some("local") => Ok(()),
            Some(other) => Err(ToolError::ExecutionFailed(format!(
                "remote embedding model \"{other}\" is not configured in this runtime; only \"local\" is supported"
            ))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// A single callable tool advertised to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, ctx: &ToolCtx, args: Value) -> Result<String, ToolError>;
}
