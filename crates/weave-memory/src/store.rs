// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::embedder::cosine_similarity;

/// A single stored memory: the original text plus its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// The on-disk shape of the whole store: one JSON document, written whole on
/// every save. There is no durable index structure underneath this — search
/// is a linear scan over `entries`, which is the right tradeoff at the scale
/// this runtime operates at (a single agent's memory, not a shared corpus).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    entries: Vec<VectorEntry>,
}

#[derive(Debug, Clone)]
pub struct VectorStore {
    path: PathBuf,
    doc: Document,
}

impl VectorStore {
    /// Load the store from `path`. A missing file is not an error — it is
    /// treated as an empty store so the first `upsert` creates the file.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Ok(Self { path, doc: Document::default() });
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading vector store {}", path.display()))?;
        let doc: Document = serde_json::from_str(&raw)
            .with_context(|| format!("parsing vector store {}", path.display()))?;
        Ok(Self { path, doc })
    }

    /// Persist the store atomically: write to a sibling temp file, then
    /// rename into place, so a crash mid-write never leaves a truncated file.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory {}", parent.display()))?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let body = serde_json::to_string_pretty(&self.doc)?;
        std::fs::write(&tmp_path, body)
            .with_context(|| format!("writing temp vector store {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming vector store into place {}", self.path.display()))?;
        Ok(())
    }

    /// Append a new entry. No deduplication is performed — storing the same
    /// text twice produces two entries, by design: this store favors recall
    /// over corpus hygiene.
    pub fn upsert(&mut self, text: impl Into<String>, embedding: Vec<f32>) -> &VectorEntry {
        let text = text.into();
        let id = entry_id(&text, self.doc.entries.len());
        self.doc.entries.push(VectorEntry { id, text, embedding });
        self.doc.entries.last().unwrap()
    }

    pub fn len(&self) -> usize {
        self.doc.entries.len()
    }

    /// All entries in storage (insertion) order, text and id only — callers
    /// that want relevance order should use [`VectorStore::search`] instead.
    pub fn entries(&self) -> &[VectorEntry] {
        &self.doc.entries
    }

    pub fn is_empty(&self) -> bool {
        self.doc.entries.is_empty()
    }

    /// Return the `top_k` entries most similar to `query_embedding`, highest
    /// score first. Ties are broken by insertion order (the sort is stable
    /// and entries are scanned in storage order, so an equal-scoring earlier
    /// entry always sorts ahead of a later one).
    pub fn search(&self, query_embedding: &[f32], top_k: usize) -> Vec<(VectorEntry, f32)> {
        let mut scored: Vec<(VectorEntry, f32)> = self
            .doc
            .entries
            .iter()
            .map(|e| (e.clone(), cosine_similarity(query_embedding, &e.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn entry_id(text: &str, index: usize) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(index.to_le_bytes());
    let digest = hasher.finalize();
    format!("v{}-{}", index, hex::encode(&digest[..4]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::embed;

    #[test]
    fn missing_file_loads_as_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::load(dir.path().join("memory.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn upsert_then_save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = VectorStore::load(&path).unwrap();
        store.upsert("remember this", embed("remember this"));
        store.save().unwrap();

        let reloaded = VectorStore::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.search(&embed("remember this"), 1)[0].0.text, "remember this");
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        let mut store = VectorStore::load(&path).unwrap();
        store.upsert("x", embed("x"));
        store.save().unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn search_returns_best_match_first() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::load(dir.path().join("memory.json")).unwrap();
        store.upsert("apples and oranges", embed("apples and oranges"));
        store.upsert("completely unrelated topic", embed("completely unrelated topic"));
        let query = embed("apples and oranges");
        let results = store.search(&query, 1);
        assert_eq!(results[0].0.text, "apples and oranges");
    }

    #[test]
    fn search_respects_top_k() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::load(dir.path().join("memory.json")).unwrap();
        for i in 0..5 {
            store.upsert(format!("entry {i}"), embed(&format!("entry {i}")));
        }
        assert_eq!(store.search(&embed("entry 0"), 3).len(), 3);
    }

    #[test]
    fn duplicate_text_is_not_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::load(dir.path().join("memory.json")).unwrap();
        store.upsert("same text", embed("same text"));
        store.upsert("same text", embed("same text"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn equal_scores_break_ties_by_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = VectorStore::load(dir.path().join("memory.json")).unwrap();
        store.upsert("identical", embed("identical"));
        store.upsert("identical", embed("identical"));
        let results = store.search(&embed("identical"), 2);
        assert_eq!(results[0].0.id, store.doc.entries[0].id);
        assert_eq!(results[1].0.id, store.doc.entries[1].id);
    }
}
