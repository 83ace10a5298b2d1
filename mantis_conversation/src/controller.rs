//! Session controller for multi-turn chat with persisted history.
//!
//! The `SessionController` owns exactly one live [`ConversationSession`],
//! drives the chat transport for each turn, and hands snapshots of the
//! session to the [`ConversationStore`]. It never prompts the user; the
//! shell decides when to call `save`, `switch_to` or `delete`.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use mantis_core::{ChatMessage, LLMProvider, Role};
use mantis_history::{
    Conversation, ConversationStore, HistoryError, SaveMode, SaveOutcome, local_now, summarize,
};

use crate::retention::RetentionConfig;
use crate::session::ConversationSession;

/// Errors that can occur during conversation management.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("LLM transport error: {0}")]
    Transport(anyhow::Error),

    #[error("Empty response from LLM")]
    EmptyResponse,

    #[error("History storage error: {0}")]
    Storage(#[from] HistoryError),

    #[error("Conversation not found: {0}")]
    NotFound(String),
}

/// Result of processing a conversation turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Model reply, the concatenation of every streamed fragment
    pub response: String,
    /// Turn number
    pub turn_number: usize,
    /// `None` when the auto-save attempt failed; the failure is logged
    pub autosave: Option<SaveOutcome>,
    /// Messages dropped from memory by the retention policy
    pub trimmed: usize,
}

pub struct SessionController<P = Arc<dyn LLMProvider>>
where
    P: Send + Sync,
{
    provider: P,
    store: ConversationStore,
    retention: RetentionConfig,
    session: ConversationSession,
}

impl<P> SessionController<P>
where
    P: LLMProvider + Send + Sync,
{
    pub fn new(provider: P, store: ConversationStore, model: impl Into<String>) -> Self {
        let session = ConversationSession::new(model);
        info!("Starting new conversation: {}", session.id);

        Self {
            provider,
            store,
            retention: RetentionConfig::default(),
            session,
        }
    }

    #[must_use]
    pub const fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Get the current session state.
    #[must_use]
    pub const fn session(&self) -> &ConversationSession {
        &self.session
    }

    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.session.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.session.model = model.into();
        info!("Switched model to {}", self.session.model);
    }

    /// Begin a fresh conversation with a new id, keeping the selected model.
    pub fn start(&mut self) {
        let model = std::mem::take(&mut self.session.model);
        self.session = ConversationSession::new(model);
        info!("Starting new conversation: {}", self.session.id);
    }

    pub fn append_user_message(&mut self, text: impl Into<String>) {
        self.session.add_message(Role::User, text.into());
    }

    pub fn append_model_message(&mut self, text: impl Into<String>) {
        self.session.add_message(Role::Model, text.into());
    }

    /// Drop a trailing user message that never got a reply.
    pub fn discard_unanswered(&mut self) -> Option<ChatMessage> {
        let discarded = self.session.pop_unanswered_user();
        if discarded.is_some() {
            debug!("Rolled back unanswered user message");
        }
        discarded
    }

    /// Per-turn save; skipped while the session has fewer than two messages.
    pub fn auto_save(&self) -> Result<SaveOutcome, ConversationError> {
        self.persist(SaveMode::Auto)
    }

    /// Explicit save. `name` replaces the session name when given.
    pub fn save(&mut self, name: Option<String>) -> Result<SaveOutcome, ConversationError> {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            self.session.name = Some(name);
        }
        self.persist(SaveMode::Manual)
    }

    /// Rename and persist immediately, regardless of message count.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<SaveOutcome, ConversationError> {
        self.session.name = Some(name.into());
        self.persist(SaveMode::Manual)
    }

    /// Apply the in-memory retention policy. Returns the number of dropped messages.
    pub fn trim_if_oversized(&mut self) -> usize {
        let trimmed = self.retention.trim_if_oversized(&mut self.session.messages);
        if trimmed > 0 {
            info!("Trimmed {trimmed} old messages from memory");
        }
        trimmed
    }

    /// Load the saved conversation `id` into the session.
    pub fn switch_to(&mut self, id: &str) -> Result<(), ConversationError> {
        let conversation = self
            .store
            .find_by_id(id)
            .ok_or_else(|| ConversationError::NotFound(id.to_string()))?;
        self.switch_to_conversation(conversation);
        Ok(())
    }

    /// Replace all session state with `conversation`.
    pub fn switch_to_conversation(&mut self, conversation: Conversation) {
        let fallback_model = self.session.model.clone();
        self.session = ConversationSession::from_conversation(conversation, &fallback_model);
        info!(
            "Switched to conversation {} ({} messages)",
            self.session.id,
            self.session.message_count()
        );
    }

    /// Run one round trip: append `input`, stream the reply through `on_chunk`,
    /// append the reply, auto-save and apply retention.
    ///
    /// On any transport failure the user message is rolled back, so a failed
    /// turn leaves the history exactly as it was.
    pub async fn process_turn<F>(
        &mut self,
        input: &str,
        mut on_chunk: F,
    ) -> Result<TurnResult, ConversationError>
    where
        F: FnMut(&str),
    {
        let turn_number = self.session.message_count() / 2 + 1;
        debug!("Processing turn {turn_number} for {}", self.session.id);

        self.append_user_message(input);

        let response = match self.collect_reply(&mut on_chunk).await {
            Ok(response) => response,
            Err(e) => {
                self.discard_unanswered();
                warn!("Turn {turn_number} failed: {e}");
                return Err(e);
            }
        };

        self.append_model_message(response.clone());

        let autosave = match self.auto_save() {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Auto-save failed: {e}");
                None
            }
        };
        let trimmed = self.trim_if_oversized();

        Ok(TurnResult {
            response,
            turn_number,
            autosave,
            trimmed,
        })
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<Conversation> {
        self.store.find_by_id(id)
    }

    #[must_use]
    pub fn list_recent(&self, max_age_days: u32, limit: usize) -> Vec<Conversation> {
        self.store.list_recent(max_age_days, limit)
    }

    #[must_use]
    pub fn list_all(&self, limit: usize) -> Vec<Conversation> {
        self.store.list_all(limit)
    }

    /// Delete saved conversations. If the active one is among them, a fresh
    /// session is started.
    pub fn delete(&mut self, ids: &HashSet<String>) -> Result<usize, ConversationError> {
        let removed = self.store.delete(ids)?;
        if ids.contains(&self.session.id) {
            self.start();
        }
        Ok(removed)
    }

    /// Delete every saved conversation and start a fresh session.
    pub fn delete_all(&mut self) -> Result<(), ConversationError> {
        self.store.delete_all()?;
        self.start();
        Ok(())
    }

    /// Listing entry for `conversation`, marked when it is the active one.
    #[must_use]
    pub fn summarize(&self, conversation: &Conversation) -> String {
        summarize(conversation, Some(&self.session.id))
    }

    fn persist(&self, mode: SaveMode) -> Result<SaveOutcome, ConversationError> {
        let snapshot = self.session.snapshot(local_now());
        Ok(self.store.upsert(snapshot, mode)?)
    }

    async fn collect_reply<F>(&self, on_chunk: &mut F) -> Result<String, ConversationError>
    where
        F: FnMut(&str),
    {
        let mut chunks = self
            .provider
            .chat_stream(&self.session.messages, &self.session.model)
            .await
            .map_err(ConversationError::Transport)?;

        let mut reply = String::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(ConversationError::Transport)?;
            if chunk.is_empty() {
                continue;
            }
            on_chunk(&chunk);
            reply.push_str(&chunk);
        }

        if reply.trim().is_empty() {
            return Err(ConversationError::EmptyResponse);
        }

        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use futures::stream;
    use mantis_core::{ChunkStream, LLMResponse};
    use tempfile::TempDir;

    enum Reply {
        Chunks(Vec<&'static str>),
        FailToOpen,
        FailMidStream,
    }

    struct ScriptedProvider {
        replies: Mutex<VecDeque<Reply>>,
        seen: Mutex<Vec<usize>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
        ) -> anyhow::Result<LLMResponse> {
            anyhow::bail!("only streaming is scripted")
        }

        async fn chat_stream(
            &self,
            messages: &[ChatMessage],
            _model: &str,
        ) -> anyhow::Result<ChunkStream> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(messages.len());
            }
            let next = self.replies.lock().ok().and_then(|mut r| r.pop_front());
            match next {
                Some(Reply::Chunks(chunks)) => Ok(stream::iter(
                    chunks.into_iter().map(|c| Ok(c.to_string())).collect::<Vec<_>>(),
                )
                .boxed()),
                Some(Reply::FailMidStream) => Ok(stream::iter(vec![
                    Ok("partial ".to_string()),
                    Err(anyhow::anyhow!("connection reset")),
                ])
                .boxed()),
                Some(Reply::FailToOpen) | None => anyhow::bail!("service unavailable"),
            }
        }

        fn get_default_model(&self) -> &'static str {
            "scripted"
        }
    }

    fn controller(replies: Vec<Reply>) -> (TempDir, SessionController<ScriptedProvider>) {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let store = ConversationStore::new(dir.path().join("history.json"));
        let controller =
            SessionController::new(ScriptedProvider::new(replies), store, "gemini-2.5-flash");
        (dir, controller)
    }

    #[tokio::test]
    async fn test_turn_round_trip_persists() {
        let (_dir, mut controller) = controller(vec![Reply::Chunks(vec!["Hel", "lo"])]);
        let mut streamed = Vec::new();

        let result = controller
            .process_turn("Hi", |chunk| streamed.push(chunk.to_string()))
            .await;

        let Ok(result) = result else {
            panic!("turn should succeed");
        };
        assert_eq!(result.response, "Hello");
        assert_eq!(result.turn_number, 1);
        assert_eq!(result.autosave, Some(SaveOutcome::Saved));
        assert_eq!(streamed, vec!["Hel", "lo"]);

        let reloaded = ConversationStore::new(controller.store().path());
        let saved = reloaded
            .find_by_id(&controller.session().id)
            .unwrap_or_else(|| panic!("conversation not persisted"));
        assert_eq!(saved.messages, vec![ChatMessage::user("Hi"), ChatMessage::model("Hello")]);
        assert_eq!(saved.model, "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn test_transport_sees_full_history() {
        let (_dir, mut controller) = controller(vec![
            Reply::Chunks(vec!["one"]),
            Reply::Chunks(vec!["two"]),
        ]);

        assert!(controller.process_turn("first", |_| {}).await.is_ok());
        assert!(controller.process_turn("second", |_| {}).await.is_ok());

        let seen = controller
            .provider
            .seen
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default();
        assert_eq!(seen, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_failed_open_rolls_back_user_message() {
        let (_dir, mut controller) = controller(vec![Reply::FailToOpen]);

        let result = controller.process_turn("Hi", |_| {}).await;

        assert!(matches!(result, Err(ConversationError::Transport(_))));
        assert!(controller.session().is_empty());
        assert!(!controller.store().path().exists());
    }

    #[tokio::test]
    async fn test_failure_mid_stream_rolls_back_user_message() {
        let (_dir, mut controller) = controller(vec![
            Reply::Chunks(vec!["fine"]),
            Reply::FailMidStream,
        ]);

        assert!(controller.process_turn("first", |_| {}).await.is_ok());
        let result = controller.process_turn("second", |_| {}).await;

        assert!(matches!(result, Err(ConversationError::Transport(_))));
        assert_eq!(
            controller.session().messages,
            vec![ChatMessage::user("first"), ChatMessage::model("fine")]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_rolls_back() {
        let (_dir, mut controller) = controller(vec![Reply::Chunks(vec!["", "  "])]);

        let result = controller.process_turn("Hi", |_| {}).await;

        assert!(matches!(result, Err(ConversationError::EmptyResponse)));
        assert!(controller.session().is_empty());
    }

    #[tokio::test]
    async fn test_session_continues_after_failure() {
        let (_dir, mut controller) =
            controller(vec![Reply::FailToOpen, Reply::Chunks(vec!["recovered"])]);

        assert!(controller.process_turn("try", |_| {}).await.is_err());
        let result = controller.process_turn("again", |_| {}).await;

        assert!(matches!(result, Ok(TurnResult { turn_number: 1, .. })));
        assert_eq!(controller.session().message_count(), 2);
    }

    #[test]
    fn test_auto_save_threshold() {
        let (_dir, mut controller) = controller(Vec::new());

        controller.append_user_message("only one");
        assert!(matches!(controller.auto_save(), Ok(SaveOutcome::Skipped)));
        assert!(!controller.store().path().exists());

        controller.append_model_message("two now");
        assert!(matches!(controller.auto_save(), Ok(SaveOutcome::Saved)));
        assert!(controller.find(&controller.session().id).is_some());
    }

    #[test]
    fn test_rename_persists_even_when_empty() {
        let (_dir, mut controller) = controller(Vec::new());

        assert!(matches!(controller.rename("Ideas"), Ok(SaveOutcome::Saved)));

        let saved = controller
            .find(&controller.session().id)
            .unwrap_or_else(|| panic!("rename should persist"));
        assert_eq!(saved.name.as_deref(), Some("Ideas"));
    }

    #[test]
    fn test_save_with_and_without_name() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("hello");

        assert!(controller.save(Some("First".to_string())).is_ok());
        assert!(controller.save(None).is_ok());

        let saved = controller
            .find(&controller.session().id)
            .unwrap_or_else(|| panic!("save should persist"));
        assert_eq!(saved.name.as_deref(), Some("First"));
        assert_eq!(controller.list_all(10).len(), 1);
    }

    #[test]
    fn test_start_assigns_new_id_and_clears() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("hello");
        controller.session.name = Some("old".to_string());
        controller.set_model("gemini-2.5-pro");
        let old_id = controller.session().id.clone();

        controller.start();

        assert_ne!(controller.session().id, old_id);
        assert!(controller.session().is_empty());
        assert!(controller.session().name.is_none());
        assert_eq!(controller.model(), "gemini-2.5-pro");
    }

    #[test]
    fn test_trim_if_oversized() {
        let (_dir, controller) = controller(Vec::new());
        let mut controller = controller
            .with_retention(RetentionConfig::default().with_max_history_length(2));

        for i in 0..4 {
            controller.append_user_message(format!("m{i}"));
        }
        assert_eq!(controller.trim_if_oversized(), 0);

        controller.append_model_message("m4");
        assert_eq!(controller.trim_if_oversized(), 3);
        let contents: Vec<&str> = controller
            .session()
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["m3", "m4"]);
    }

    #[test]
    fn test_switch_to_loads_saved_state() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("Hi");
        controller.append_model_message("Hello");
        assert!(controller.rename("Greeting").is_ok());
        let saved_id = controller.session().id.clone();

        controller.start();
        let before_switch = controller.session().started_at;
        assert!(controller.switch_to(&saved_id).is_ok());

        let session = controller.session();
        assert_eq!(session.id, saved_id);
        assert_eq!(session.name.as_deref(), Some("Greeting"));
        assert_eq!(session.message_count(), 2);
        assert!(session.started_at >= before_switch);
    }

    #[test]
    fn test_switch_to_unknown_id() {
        let (_dir, mut controller) = controller(Vec::new());
        let id = controller.session().id.clone();

        let result = controller.switch_to("conv_nope");

        assert!(matches!(result, Err(ConversationError::NotFound(ref missing)) if missing == "conv_nope"));
        assert_eq!(controller.session().id, id);
    }

    #[test]
    fn test_deleting_active_conversation_starts_fresh() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("Hi");
        assert!(controller.save(None).is_ok());
        let active = controller.session().id.clone();

        let removed = controller.delete(&HashSet::from([active.clone()]));

        assert!(matches!(removed, Ok(1)));
        assert_ne!(controller.session().id, active);
        assert!(controller.session().is_empty());
    }

    #[test]
    fn test_delete_all_starts_fresh() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("Hi");
        assert!(controller.save(None).is_ok());
        let active = controller.session().id.clone();

        assert!(controller.delete_all().is_ok());

        assert!(controller.list_all(200).is_empty());
        assert_ne!(controller.session().id, active);
    }

    #[test]
    fn test_summarize_marks_active() {
        let (_dir, mut controller) = controller(Vec::new());
        controller.append_user_message("Hi");
        assert!(controller.save(None).is_ok());

        let listing = controller.list_recent(7, 100);
        assert_eq!(listing.len(), 1);
        assert!(controller.summarize(&listing[0]).ends_with("CURRENT"));
    }
}
