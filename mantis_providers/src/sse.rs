use serde_json::Value;

/// Incremental parser for Gemini `streamGenerateContent?alt=sse` bodies.
///
/// Each complete frame becomes at most one item: the frame's text, or an
/// error when the frame carries an API error or a blocked prompt.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    buffer: String,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete frames.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<anyhow::Result<String>> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut items = Vec::new();
        while let Some(split) = self.buffer.find("\n\n") {
            let frame = self.buffer[..split].to_string();
            self.buffer.drain(0..split + 2);
            items.extend(parse_frame(&frame));
        }
        items
    }

    /// Flush a trailing frame that was not terminated by a blank line.
    pub fn finish(&mut self) -> Vec<anyhow::Result<String>> {
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(rest.trim()).into_iter().collect()
    }
}

fn parse_frame(frame: &str) -> Option<anyhow::Result<String>> {
    let payload = extract_data_payload(frame)?;
    if payload == "[DONE]" {
        return None;
    }

    let value = match serde_json::from_str::<Value>(&payload) {
        Ok(value) => value,
        Err(e) => return Some(Err(anyhow::anyhow!("Malformed stream frame: {e}"))),
    };

    if let Some(message) = error_message(&value) {
        return Some(Err(anyhow::anyhow!("Gemini stream error: {message}")));
    }

    let text = response_text(&value);
    (!text.is_empty()).then_some(Ok(text))
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// API error or prompt block reason carried by a response body, if any.
pub fn error_message(value: &Value) -> Option<String> {
    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Some(message.to_string());
    }

    value
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(Value::as_str)
        .map(|reason| format!("prompt blocked ({reason})"))
}

/// Concatenated visible text of the first candidate; thought parts are skipped.
pub fn response_text(value: &Value) -> String {
    value
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|p| !p.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> String {
        format!(
            "data: {{\"candidates\":[{{\"content\":{{\"role\":\"model\",\"parts\":[{{\"text\":\"{text}\"}}]}}}}]}}\r\n\r\n"
        )
    }

    fn texts(items: Vec<anyhow::Result<String>>) -> Vec<String> {
        items.into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_parse_frames_incrementally() {
        let mut parser = SseStreamParser::default();
        let body = format!("{}{}", frame("Hel"), frame("lo"));
        let (first, second) = body.split_at(17);

        let mut collected = texts(parser.feed(first.as_bytes()));
        collected.extend(texts(parser.feed(second.as_bytes())));
        collected.extend(texts(parser.finish()));

        assert_eq!(collected, vec!["Hel", "lo"]);
    }

    #[test]
    fn test_unterminated_final_frame_is_flushed() {
        let mut parser = SseStreamParser::default();
        let body = frame("tail");
        let trimmed = body.trim_end();

        assert!(parser.feed(trimmed.as_bytes()).is_empty());
        assert_eq!(texts(parser.finish()), vec!["tail"]);
    }

    #[test]
    fn test_thought_parts_are_skipped() {
        let value: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"thinking...","thought":true},
                {"text":"answer"}
            ]}}]}"#,
        )
        .unwrap_or_default();
        assert_eq!(response_text(&value), "answer");
    }

    #[test]
    fn test_error_frame_becomes_error_item() {
        let mut parser = SseStreamParser::default();
        let items = parser.feed(b"data: {\"error\":{\"code\":429,\"message\":\"quota\"}}\n\n");

        assert_eq!(items.len(), 1);
        assert!(items[0].as_ref().is_err_and(|e| e.to_string().contains("quota")));
    }

    #[test]
    fn test_blocked_prompt_is_reported() {
        let value: Value =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
                .unwrap_or_default();
        assert_eq!(
            error_message(&value).as_deref(),
            Some("prompt blocked (SAFETY)")
        );
    }

    #[test]
    fn test_frames_without_text_are_ignored() {
        let mut parser = SseStreamParser::default();
        let items = parser.feed(b": keep-alive\n\ndata: {\"usageMetadata\":{}}\n\n");
        assert!(items.is_empty());
    }
}
