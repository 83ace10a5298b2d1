//! Gemini models the chat shell offers.

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

pub const AVAILABLE_MODELS: [&str; 5] = [
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

const THINKING_SUPPORTED_MODELS: [&str; 3] =
    ["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.5-flash-lite"];

/// Whether requests for `model` should carry a dynamic thinking budget.
#[must_use]
pub fn supports_thinking(model: &str) -> bool {
    THINKING_SUPPORTED_MODELS.contains(&model)
}

/// Resolve a menu choice: a 1-based index into [`AVAILABLE_MODELS`] or an
/// exact model name. Anything else falls back to [`DEFAULT_MODEL`].
#[must_use]
pub fn select_model(choice: &str) -> &'static str {
    let choice = choice.trim();

    if let Ok(index) = choice.parse::<usize>() {
        return index
            .checked_sub(1)
            .and_then(|i| AVAILABLE_MODELS.get(i))
            .copied()
            .unwrap_or(DEFAULT_MODEL);
    }

    AVAILABLE_MODELS
        .iter()
        .find(|m| **m == choice)
        .copied()
        .unwrap_or(DEFAULT_MODEL)
}
