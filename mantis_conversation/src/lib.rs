#![warn(
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

//! Live chat sessions backed by the conversation history store.
//!
//! # Key Features
//! - One active conversation with a stable id
//! - Streaming turns with rollback of the user message on failure
//! - Auto-save after every completed turn
//! - Separate in-memory and persisted retention limits

mod controller;
mod retention;
mod session;

pub use controller::{ConversationError, SessionController, TurnResult};
pub use retention::RetentionConfig;
pub use session::ConversationSession;
