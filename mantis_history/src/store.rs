//! JSON-file backed conversation store.
//!
//! The whole collection lives in one pretty-printed JSON document. Every
//! operation reads the file fresh and every mutation rewrites it through a
//! temporary sibling file followed by a rename, so a crash mid-write leaves
//! the previous version in place. There is no locking: one process is
//! expected to own the file at a time.
//!
//! Reads never fail. A missing file is an empty history; an unreadable or
//! malformed file is logged at `warn` and also treated as empty, which means
//! the next successful write replaces whatever was there. Callers that need
//! to detect that case use [`ConversationStore::try_load`].

use std::collections::HashSet;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

use crate::error::HistoryError;
use crate::schema::{Conversation, ConversationCollection, StoreLimits};
use crate::time::{local_now, parse_timestamp};

const TEMP_SUFFIX: &str = "tmp";

/// Whether an upsert came from an explicit user action or the per-turn hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    Manual,
    /// Skipped when the conversation has fewer than two messages
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    path: PathBuf,
    limits: StoreLimits,
}

impl ConversationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            limits: StoreLimits::default(),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: StoreLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn limits(&self) -> StoreLimits {
        self.limits
    }

    /// Read the collection, surfacing read and parse failures.
    ///
    /// A missing file is `Ok` with an empty collection.
    pub fn try_load(&self) -> Result<ConversationCollection, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(ConversationCollection::default());
            }
            Err(e) => return Err(HistoryError::unavailable("reading history", &self.path, e)),
        };

        serde_json::from_str(&content).map_err(|e| HistoryError::corrupt(&self.path, e))
    }

    /// Read the collection; any failure yields an empty one.
    #[must_use]
    pub fn load(&self) -> ConversationCollection {
        match self.try_load() {
            Ok(collection) => collection,
            Err(e) => {
                warn!("History file unusable, continuing with empty history: {e}");
                ConversationCollection::default()
            }
        }
    }

    /// Replace the file with `collection`.
    pub fn save(&self, collection: &ConversationCollection) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| HistoryError::unavailable("creating history directory", parent, e))?;
        }

        let json = serde_json::to_string_pretty(collection).map_err(HistoryError::Serialize)?;

        let tmp_path = self.temp_path();
        if let Err(e) = write_synced(&tmp_path, json.as_bytes()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(HistoryError::unavailable("writing history", &tmp_path, e));
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(HistoryError::unavailable("replacing history", &self.path, e));
        }

        debug!(
            "Wrote {} conversations to {}",
            collection.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Insert or replace `conversation` by id, then enforce both limits.
    ///
    /// In [`SaveMode::Auto`] a conversation with fewer than two messages is
    /// skipped without touching the file.
    pub fn upsert(
        &self,
        mut conversation: Conversation,
        mode: SaveMode,
    ) -> Result<SaveOutcome, HistoryError> {
        if mode == SaveMode::Auto && conversation.messages.len() < 2 {
            return Ok(SaveOutcome::Skipped);
        }

        let excess = conversation
            .messages
            .len()
            .saturating_sub(self.limits.max_history_length);
        conversation.messages.drain(..excess);

        let mut collection = self.load();
        let id = conversation.id.clone();

        if let Some(existing) = collection
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation.id)
        {
            *existing = conversation;
        } else {
            collection.conversations.push(conversation);
        }

        let evicted = collection
            .conversations
            .len()
            .saturating_sub(self.limits.max_conversations);
        if evicted > 0 {
            collection.conversations.drain(..evicted);
            info!("Evicted {evicted} oldest conversations from history");
        }

        self.save(&collection)?;

        match mode {
            SaveMode::Manual => info!("Saved conversation {id} to {}", self.path.display()),
            SaveMode::Auto => debug!("Auto-saved conversation {id}"),
        }
        Ok(SaveOutcome::Saved)
    }

    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<Conversation> {
        self.load()
            .conversations
            .into_iter()
            .find(|c| c.id == id)
    }

    /// Conversations saved within `max_age_days`, newest `limit` by position.
    ///
    /// Entries whose timestamp does not parse are kept.
    #[must_use]
    pub fn list_recent(&self, max_age_days: u32, limit: usize) -> Vec<Conversation> {
        self.list_recent_at(local_now(), max_age_days, limit)
    }

    #[must_use]
    pub fn list_recent_at(
        &self,
        now: NaiveDateTime,
        max_age_days: u32,
        limit: usize,
    ) -> Vec<Conversation> {
        let max_age = TimeDelta::days(i64::from(max_age_days));

        let recent: Vec<Conversation> = self
            .load()
            .conversations
            .into_iter()
            .filter(|c| parse_timestamp(&c.timestamp).is_none_or(|saved| now - saved < max_age))
            .collect();

        keep_last(recent, limit)
    }

    #[must_use]
    pub fn list_all(&self, limit: usize) -> Vec<Conversation> {
        keep_last(self.load().conversations, limit)
    }

    /// Remove every conversation whose id is in `ids`; returns how many went.
    pub fn delete(&self, ids: &HashSet<String>) -> Result<usize, HistoryError> {
        let mut collection = self.load();
        if collection.is_empty() {
            return Ok(0);
        }

        let before = collection.len();
        collection.conversations.retain(|c| !ids.contains(&c.id));
        let removed = before - collection.len();

        self.save(&collection)?;
        info!("Deleted {removed} conversations");
        Ok(removed)
    }

    pub fn delete_all(&self) -> Result<(), HistoryError> {
        self.save(&ConversationCollection::default())?;
        info!("Deleted all conversations");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".");
        name.push(TEMP_SUFFIX);
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn keep_last(mut conversations: Vec<Conversation>, limit: usize) -> Vec<Conversation> {
    let start = conversations.len().saturating_sub(limit);
    conversations.split_off(start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mantis_core::ChatMessage;

    fn conversation(id: &str, messages: usize) -> Conversation {
        Conversation {
            id: id.to_string(),
            name: None,
            timestamp: "2025-01-01T00:00:00.000000".to_string(),
            model: "gemini-2.5-flash".to_string(),
            session_duration: "0:00:01".to_string(),
            messages: (0..messages)
                .map(|i| ChatMessage::user(format!("message {i}")))
                .collect(),
        }
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let store = ConversationStore::new("/data/history.json");
        assert_eq!(store.temp_path(), PathBuf::from("/data/history.json.tmp"));
    }

    #[test]
    fn test_keep_last() {
        let all: Vec<Conversation> = (0..4).map(|i| conversation(&format!("c{i}"), 0)).collect();
        let ids: Vec<String> = keep_last(all, 3).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn test_auto_save_below_threshold_skips_io() {
        // A path whose parent is a file would fail any write attempt.
        let store = ConversationStore::new("/dev/null/history.json");
        let outcome = store.upsert(conversation("c1", 1), SaveMode::Auto);
        assert!(matches!(outcome, Ok(SaveOutcome::Skipped)));
    }

    #[test]
    fn test_manual_save_reports_unavailable_storage() {
        let store = ConversationStore::new("/dev/null/history.json");
        let outcome = store.upsert(conversation("c1", 1), SaveMode::Manual);
        assert!(matches!(
            outcome,
            Err(HistoryError::StorageUnavailable { .. })
        ));
    }
}
