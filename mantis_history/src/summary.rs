//! Human-readable renderings of saved conversations.

use std::fmt::Write;

use mantis_core::ChatMessage;

use crate::schema::Conversation;
use crate::time::parse_timestamp;

const ID_DISPLAY_CHARS: usize = 20;
const LOADED_MESSAGE_MAX_CHARS: usize = 800;
const RULE_WIDTH: usize = 60;

/// How much of each message a transcript shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptView {
    /// Messages longer than 800 characters are cut with a length note
    Loaded,
    Full,
}

/// First 20 characters of an id, as shown in listings.
#[must_use]
pub fn short_id(id: &str) -> &str {
    id.char_indices()
        .nth(ID_DISPLAY_CHARS)
        .map_or(id, |(end, _)| &id[..end])
}

/// Three-line listing entry, with a `CURRENT` marker line when
/// `conversation.id` equals `current_id`.
#[must_use]
pub fn summarize(conversation: &Conversation, current_id: Option<&str>) -> String {
    let time = parse_timestamp(&conversation.timestamp).map_or_else(
        || "unknown time".to_string(),
        |t| t.format("%Y-%m-%d %H:%M").to_string(),
    );
    let model = if conversation.model.is_empty() {
        "unknown"
    } else {
        conversation.model.as_str()
    };

    let mut summary = format!(
        "ID: {}\n    {time} | Model: {model} | Messages count: {} messages\n   Title: {}",
        short_id(&conversation.id),
        conversation.message_count(),
        conversation.title(),
    );

    if current_id == Some(conversation.id.as_str()) {
        summary.push_str("\n    CURRENT");
    }

    summary
}

#[must_use]
pub fn render_transcript(
    messages: &[ChatMessage],
    name: Option<&str>,
    id: Option<&str>,
    view: TranscriptView,
) -> String {
    let heading = match view {
        TranscriptView::Loaded => "LOADED",
        TranscriptView::Full => "FULL",
    };

    if messages.is_empty() {
        return match view {
            TranscriptView::Loaded => "No messages in loaded conversation.".to_string(),
            TranscriptView::Full => "No messages in current conversation.".to_string(),
        };
    }

    let rule = "=".repeat(RULE_WIDTH);
    let mut out = format!("\n{rule}\n {heading} CONVERSATION CONTENT\n");
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        let _ = writeln!(out, " NAME: {name}");
    }
    if let Some(id) = id {
        let _ = writeln!(out, " ID: {id}");
    }
    let _ = writeln!(out, " MESSAGES: {}", messages.len());
    out.push_str(&rule);
    out.push('\n');

    for (i, msg) in messages.iter().enumerate() {
        let _ = writeln!(out, "\n[{}] {}:", i + 1, msg.role.display_name());
        let total = msg.content.chars().count();
        if view == TranscriptView::Loaded && total > LOADED_MESSAGE_MAX_CHARS {
            let shown: String = msg.content.chars().take(LOADED_MESSAGE_MAX_CHARS).collect();
            let _ = writeln!(out, "{shown}... (truncated, {total} total chars)");
        } else {
            let _ = writeln!(out, "{}", msg.content);
        }
    }

    let _ = writeln!(out, "{rule}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Conversation {
        Conversation {
            id: "conv_20250101_120000_abcdef12".to_string(),
            name: None,
            timestamp: "2025-01-01T12:30:45.123456".to_string(),
            model: "gemini-2.5-flash".to_string(),
            session_duration: "0:01:00".to_string(),
            messages: vec![ChatMessage::user("x".repeat(60)), ChatMessage::model("ok")],
        }
    }

    #[test]
    fn test_summarize_layout() {
        let summary = summarize(&conversation(), None);
        let expected = format!(
            "ID: conv_20250101_120000\n    2025-01-01 12:30 | Model: gemini-2.5-flash | Messages count: 2 messages\n   Title: {}...",
            "x".repeat(50)
        );
        assert_eq!(summary, expected);
    }

    #[test]
    fn test_summarize_marks_current() {
        let conv = conversation();
        assert!(summarize(&conv, Some(&conv.id)).ends_with("\n    CURRENT"));
        assert!(!summarize(&conv, Some("conv_other")).contains("CURRENT"));
    }

    #[test]
    fn test_summarize_fallbacks() {
        let mut conv = conversation();
        conv.timestamp = "not a date".to_string();
        conv.model = String::new();
        conv.messages.clear();

        let summary = summarize(&conv, None);
        assert!(summary.contains("unknown time | Model: unknown | Messages count: 0 messages"));
        assert!(summary.ends_with("Title: Empty conversation"));
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("conv_1"), "conv_1");
        assert_eq!(short_id("conv_20250101_120000_abcdef12"), "conv_20250101_120000");
    }

    #[test]
    fn test_loaded_transcript_truncates_long_messages() {
        let messages = vec![ChatMessage::user("a".repeat(900)), ChatMessage::model("short")];
        let loaded = render_transcript(&messages, Some("Notes"), Some("conv_1"), TranscriptView::Loaded);

        assert!(loaded.contains(" NAME: Notes"));
        assert!(loaded.contains(" MESSAGES: 2"));
        assert!(loaded.contains(&format!("{}... (truncated, 900 total chars)", "a".repeat(800))));
        assert!(loaded.contains("[2] AI:\nshort"));

        let full = render_transcript(&messages, None, None, TranscriptView::Full);
        assert!(full.contains(&"a".repeat(900)));
        assert!(!full.contains("truncated"));
        assert!(full.contains("[1] You:"));
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(
            render_transcript(&[], None, None, TranscriptView::Full),
            "No messages in current conversation."
        );
    }
}
