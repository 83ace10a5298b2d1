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

//! Durable storage for saved chat conversations.
//!
//! All conversations live in a single JSON document shaped as
//! `{ "conversations": [ ... ] }`, ordered by last write. The store caps both
//! the number of conversations and the messages kept per conversation.

mod error;
mod id;
mod schema;
mod store;
mod summary;
mod time;

pub use error::HistoryError;
pub use id::{generate_conversation_id, generate_conversation_id_at};
pub use schema::{
    Conversation, ConversationCollection, MAX_CONVERSATIONS, MAX_HISTORY_LENGTH, StoreLimits,
};
pub use store::{ConversationStore, SaveMode, SaveOutcome};
pub use summary::{TranscriptView, render_transcript, short_id, summarize};
pub use time::{format_duration, format_timestamp, local_now, parse_timestamp};
