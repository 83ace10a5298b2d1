//! The live, in-memory side of a conversation.
//!
//! A session owns the ordered message list plus the metadata that is stamped
//! onto a [`Conversation`] whenever it is saved.

use chrono::{NaiveDateTime, TimeDelta};

use mantis_core::{ChatMessage, Role};
use mantis_history::{
    Conversation, format_duration, format_timestamp, generate_conversation_id, local_now,
};

#[derive(Debug, Clone)]
pub struct ConversationSession {
    /// Conversation identifier, fixed for the lifetime of the conversation
    pub id: String,
    /// Session name (optional)
    pub name: Option<String>,
    /// Message history in display order
    pub messages: Vec<ChatMessage>,
    /// When this session began, or when the conversation was loaded into it
    pub started_at: NaiveDateTime,
    /// Model used for new turns
    pub model: String,
}

impl ConversationSession {
    /// Create a new empty session with a fresh id.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: generate_conversation_id(),
            name: None,
            messages: Vec::new(),
            started_at: local_now(),
            model: model.into(),
        }
    }

    /// Resume a saved conversation. Duration tracking restarts at load time.
    #[must_use]
    pub fn from_conversation(conversation: Conversation, fallback_model: &str) -> Self {
        let model = if conversation.model.is_empty() {
            fallback_model.to_string()
        } else {
            conversation.model
        };

        Self {
            id: conversation.id,
            name: conversation.name.filter(|n| !n.is_empty()),
            messages: conversation.messages,
            started_at: local_now(),
            model,
        }
    }

    /// Set session name.
    #[must_use]
    pub fn with_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    /// Add a message to the session.
    pub fn add_message(&mut self, role: Role, content: String) {
        self.messages.push(ChatMessage { role, content });
    }

    /// Remove the last message if it is a user message still waiting for a reply.
    pub fn pop_unanswered_user(&mut self) -> Option<ChatMessage> {
        if self.messages.last().is_some_and(|m| m.role == Role::User) {
            self.messages.pop()
        } else {
            None
        }
    }

    /// Get the last N messages from history.
    #[must_use]
    pub fn last_n_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Get message count.
    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Check if session is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn elapsed(&self, now: NaiveDateTime) -> TimeDelta {
        now - self.started_at
    }

    /// Persistable copy of this session as of `now`.
    #[must_use]
    pub fn snapshot(&self, now: NaiveDateTime) -> Conversation {
        Conversation {
            id: self.id.clone(),
            name: self.name.clone(),
            timestamp: format_timestamp(now),
            model: self.model.clone(),
            session_duration: format_duration(self.elapsed(now)),
            messages: self.messages.clone(),
        }
    }
}
