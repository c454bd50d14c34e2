// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use weave_model::Message;

/// In-memory conversation session: an opaque id and its ordered message list.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), messages: Vec::new() }
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        self.messages.extend(msgs);
    }
}

/// On-disk shape of a saved session: just the ordered message list, the id
/// lives in the filename so it is never duplicated inside the file.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    messages: Vec<Message>,
}

/// Loads and saves session message lists, one JSON file per session id under
/// a `sessions/` directory. Saves are atomic: written to a sibling temp file
/// then renamed into place, so a save is observed as all-or-nothing even if
/// the process is killed mid-write.
#[derive(Debug, Clone)]
pub struct SessionStore {
    dir: PathBuf,
}

impl SessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    /// Returns `Ok(None)` if no session file exists yet for this id.
    pub fn load(&self, session_id: &str) -> Result<Option<Vec<Message>>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        let persisted: PersistedSession = serde_json::from_str(&raw)
            .with_context(|| format!("parsing session file {}", path.display()))?;
        Ok(Some(persisted.messages))
    }

    pub fn save(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating sessions dir {}", self.dir.display()))?;
        let path = self.path_for(session_id);
        let tmp_path = self.dir.join(format!("{session_id}.json.tmp"));
        let body = serde_json::to_string_pretty(&PersistedSession {
            messages: messages.to_vec(),
        })?;
        std::fs::write(&tmp_path, body)
            .with_context(|| format!("writing temp session file {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &path)
            .with_context(|| format!("renaming session file into place {}", path.display()))?;
        Ok(())
    }
}

pub fn default_sessions_dir(base: &Path) -> PathBuf {
    base.join("sessions")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use weave_model::Message;

    // ── Session ──────────────────────────────────────────────────────────────

    #[test]
    fn new_session_starts_empty() {
        let s = Session::new("abc");
        assert!(s.messages.is_empty());
        assert_eq!(s.id, "abc");
    }

    #[test]
    fn push_many_preserves_order() {
        let mut s = Session::new("abc");
        s.push_many([Message::user("a"), Message::assistant_text("b")]);
        assert_eq!(s.messages.len(), 2);
        assert_eq!(s.messages[0].as_text(), Some("a"));
    }

    // ── SessionStore round-trip ───────────────────────────────────────────────

    #[test]
    fn save_then_load_round_trips_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let messages = vec![Message::user("hello"), Message::assistant_text("hi")];
        store.save("chat-1", &messages).unwrap();
        let loaded = store.load("chat-1").unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].as_text(), Some("hello"));
        assert_eq!(loaded[1].as_text(), Some("hi"));
    }

    #[test]
    fn load_missing_session_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        assert!(store.load("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn save_overwrites_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save("chat-1", &[Message::user("first")]).unwrap();
        store.save("chat-1", &[Message::user("second")]).unwrap();
        let loaded = store.load("chat-1").unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].as_text(), Some("second"));
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        store.save("chat-1", &[Message::user("x")]).unwrap();
        assert!(!dir.path().join("chat-1.json.tmp").exists());
        assert!(dir.path().join("chat-1.json").exists());
    }
}
