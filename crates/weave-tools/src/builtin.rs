// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tools shipped with the runtime rather than registered by a front end:
//! the two sides of local semantic memory.
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCtx, ToolError};

/// Store a piece of text in the local vector store, embedding it first.
pub struct VectorUpsertTool;

#[async_trait]
impl Tool for VectorUpsertTool {
    fn name(&self) -> &str {
        "vector_upsert"
    }

    fn description(&self) -> &str {
        "Store a piece of text in local semantic memory so it can be found later by vector_search."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string", "description": "The text to remember." }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, ctx: &ToolCtx, args: Value) -> Result<String, ToolError> {
        ctx.embedding_model_supported()?;
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing \"text\" field".to_string()))?;

        let embedding = (ctx.get_embeddings)(&[text.to_string()])
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::ExecutionFailed("embedder returned no vector".to_string()))?;

        let mut store = ctx.vector_store.write().await;
        let entry = store.upsert(text, embedding);
        let id = entry.id.clone();
        store
            .save()
            .map_err(|e| ToolError::ExecutionFailed(format!("saving vector store: {e}")))?;

        Ok(format!("stored as {id}"))
    }
}

/// Search the local vector store for entries semantically similar to a query.
pub struct VectorSearchTool;

#[async_trait]
impl Tool for VectorSearchTool {
    fn name(&self) -> &str {
        "vector_search"
    }

    fn description(&self) -> &str {
        "Search local semantic memory for text previously stored with vector_upsert."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "The text to search for." },
                "top_k": { "type": "integer", "description": "Maximum number of results to return (default 3)." }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, ctx: &ToolCtx, args: Value) -> Result<String, ToolError> {
        ctx.embedding_model_supported()?;
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("missing \"query\" field".to_string()))?;
        let top_k = args
            .get("top_k")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(3);

        let embedding = (ctx.get_embeddings)(&[query.to_string()])
            .into_iter()
            .next()
            .ok_or_else(|| ToolError::ExecutionFailed("embedder returned no vector".to_string()))?;

        let results = {
            let store = ctx.vector_store.read().await;
            store.search(&embedding, top_k)
        };

        if results.is_empty() {
            return Ok("no matching memories found".to_string());
        }

        let mut out = String::new();
        for (entry, score) in results {
            out.push_str(&format!("[{:.4}] ({}) {}\n", score, entry.id, entry.text));
        }
        Ok(out.trim_end().to_string())
    }
}
