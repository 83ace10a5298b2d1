//! In-memory retention for a live session.
//!
//! The persisted copy is capped on every save. The live buffer is allowed to
//! grow to a multiple of that cap before it is cut back, so trimming happens
//! in occasional large steps instead of on every message.

use mantis_core::ChatMessage;
use mantis_history::MAX_HISTORY_LENGTH;

const DEFAULT_TRIM_FACTOR: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Messages kept after a trim
    pub max_history_length: usize,
    /// Buffer may reach `max_history_length * trim_factor` before trimming
    pub trim_factor: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_history_length: MAX_HISTORY_LENGTH,
            trim_factor: DEFAULT_TRIM_FACTOR,
        }
    }
}

impl RetentionConfig {
    #[must_use]
    pub const fn with_max_history_length(mut self, max: usize) -> Self {
        self.max_history_length = max;
        self
    }

    #[must_use]
    pub const fn with_trim_factor(mut self, factor: usize) -> Self {
        self.trim_factor = factor;
        self
    }

    #[must_use]
    pub const fn trim_threshold(&self) -> usize {
        self.max_history_length.saturating_mul(self.trim_factor)
    }

    /// Cut `messages` to the newest `max_history_length` once it exceeds the
    /// threshold. Returns how many messages were dropped.
    pub fn trim_if_oversized(&self, messages: &mut Vec<ChatMessage>) -> usize {
        if messages.len() <= self.trim_threshold() {
            return 0;
        }

        let excess = messages.len() - self.max_history_length;
        messages.drain(..excess);
        excess
    }
}
