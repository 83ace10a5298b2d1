#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};

/// Speaker of a chat message. Serialized with the Gemini role names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Label used when rendering a transcript for a human.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Model => "AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Model => f.write_str("model"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Finite, non-restartable sequence of text fragments for one turn.
///
/// Concatenating every `Ok` item yields the full reply. An `Err` item ends the turn.
pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// Chat transport consumed by the session layer.
///
/// `messages` is the full ordered history including the newest user message.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse>;

    /// Stream the reply as fragments. Providers without native streaming
    /// yield the whole reply as a single fragment.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> anyhow::Result<ChunkStream> {
        let response = self.chat(messages, model).await?;
        Ok(stream::once(async move { Ok(response.content) }).boxed())
    }

    fn get_default_model(&self) -> &str;
}

#[async_trait]
impl<T> LLMProvider for std::sync::Arc<T>
where
    T: LLMProvider + ?Sized,
{
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse> {
        (**self).chat(messages, model).await
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> anyhow::Result<ChunkStream> {
        (**self).chat_stream(messages, model).await
    }

    fn get_default_model(&self) -> &str {
        (**self).get_default_model()
    }
}
