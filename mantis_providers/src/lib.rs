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

pub mod gemini;
pub mod models;
pub mod retry;
pub mod sse;

pub use gemini::{GeminiApiError, GeminiProvider};
pub use models::{AVAILABLE_MODELS, DEFAULT_MODEL, select_model, supports_thinking};
pub use retry::{RetryPolicy, retry_with_backoff};
