//! On-disk shape of the conversation history file.

use mantis_core::{ChatMessage, Role};
use serde::{Deserialize, Deserializer, Serialize};

/// Messages kept per conversation when it is persisted.
pub const MAX_HISTORY_LENGTH: usize = 200;
/// Conversations kept in the history file.
pub const MAX_CONVERSATIONS: usize = 200;

const TITLE_MAX_CHARS: usize = 50;
const EMPTY_TITLE: &str = "Empty conversation";

/// Retention limits applied on every upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    /// Most recent messages kept per persisted conversation
    pub max_history_length: usize,
    /// Most recently written conversations kept in the file
    pub max_conversations: usize,
}

impl Default for StoreLimits {
    fn default() -> Self {
        Self {
            max_history_length: MAX_HISTORY_LENGTH,
            max_conversations: MAX_CONVERSATIONS,
        }
    }
}

impl StoreLimits {
    #[must_use]
    pub const fn with_max_history_length(mut self, max: usize) -> Self {
        self.max_history_length = max;
        self
    }

    #[must_use]
    pub const fn with_max_conversations(mut self, max: usize) -> Self {
        self.max_conversations = max;
        self
    }
}

/// One saved chat session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// ISO-8601 time of the last save
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_duration: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Display title: the explicit name, else the first user message
    /// cut to 50 characters, else a fixed placeholder.
    #[must_use]
    pub fn title(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }

        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map_or_else(
                || EMPTY_TITLE.to_string(),
                |m| {
                    let mut title: String = m.content.chars().take(TITLE_MAX_CHARS).collect();
                    if m.content.chars().count() > TITLE_MAX_CHARS {
                        title.push_str("...");
                    }
                    title
                },
            )
    }

    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.messages.len()
    }
}

/// The whole history file: `{ "conversations": [...] }`, oldest write first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCollection {
    pub conversations: Vec<Conversation>,
}

impl ConversationCollection {
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }

    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Last `limit` entries by position.
    #[must_use]
    pub fn tail(&self, limit: usize) -> &[Conversation] {
        let start = self.conversations.len().saturating_sub(limit);
        &self.conversations[start..]
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
