use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use mantis_core::{ChatMessage, ChunkStream, LLMProvider, LLMResponse, Usage};
use reqwest::{Client, Response};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{DEFAULT_MODEL, supports_thinking};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::sse::{SseStreamParser, error_message, response_text};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Non-success HTTP status returned by the Gemini API.
#[derive(Debug, Error)]
#[error("Gemini API returned {status}: {message}")]
pub struct GeminiApiError {
    pub status: u16,
    pub message: String,
}

impl GeminiApiError {
    /// Rate limits and server-side failures are worth another attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        self.status == 429 || self.status >= 500
    }
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    google_search: bool,
    retry: RetryPolicy,
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String) -> Self {
        info!("Creating GeminiProvider");
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            google_search: true,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_google_search(mut self, enabled: bool) -> Self {
        self.google_search = enabled;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Request body for `generateContent` / `streamGenerateContent`.
    #[must_use]
    pub fn build_request(&self, messages: &[ChatMessage], model: &str) -> Value {
        let contents: Vec<Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.to_string(),
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        let mut request = json!({ "contents": contents });
        if self.google_search {
            request["tools"] = json!([{ "google_search": {} }]);
        }
        if supports_thinking(model) {
            request["generationConfig"] = json!({ "thinkingConfig": { "thinkingBudget": -1 } });
        }
        request
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    /// Send one request and turn HTTP failures into [`GeminiApiError`].
    async fn try_send(&self, url: &str, request: &Value) -> anyhow::Result<Response> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or(body);

        Err(GeminiApiError {
            status: status.as_u16(),
            message,
        }
        .into())
    }

    async fn send_with_retry(&self, url: &str, request: &Value) -> anyhow::Result<Response> {
        retry_with_backoff(|| self.try_send(url, request), &self.retry, is_transient).await
    }
}

fn is_transient(error: &anyhow::Error) -> bool {
    if let Some(api) = error.downcast_ref::<GeminiApiError>() {
        return api.is_transient();
    }
    error
        .downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout() || e.is_connect())
}

fn parse_usage(value: &Value) -> Option<Usage> {
    let usage = value.get("usageMetadata")?;
    let field = |name: &str| {
        usage
            .get(name)
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };

    Some(Usage {
        prompt_tokens: field("promptTokenCount"),
        completion_tokens: field("candidatesTokenCount"),
        total_tokens: field("totalTokenCount"),
    })
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    parser: SseStreamParser,
    pending: VecDeque<anyhow::Result<String>>,
    finished: bool,
}

/// Adapt an SSE response body into text fragments. The first error ends the stream.
fn into_chunk_stream(response: Response) -> ChunkStream {
    let state = StreamState {
        bytes: response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()))
            .boxed(),
        parser: SseStreamParser::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let items = state.parser.feed(&bytes);
                    state.pending.extend(items);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    let items = state.parser.finish();
                    state.pending.extend(items);
                }
            }
        }
    })
    .boxed()
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> anyhow::Result<LLMResponse> {
        let request = self.build_request(messages, model);
        let url = self.endpoint(model, "generateContent");

        info!("Sending request to Gemini API: model={}", model);
        let body = self
            .send_with_retry(&url, &request)
            .await?
            .json::<Value>()
            .await?;

        if let Some(message) = error_message(&body) {
            anyhow::bail!("Gemini API error: {message}");
        }

        let content = response_text(&body);
        debug!("Received {} chars from Gemini API", content.len());

        Ok(LLMResponse {
            content,
            usage: parse_usage(&body),
        })
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> anyhow::Result<ChunkStream> {
        let request = self.build_request(messages, model);
        let url = format!("{}?alt=sse", self.endpoint(model, "streamGenerateContent"));

        info!("Opening Gemini stream: model={}", model);
        let response = self.send_with_retry(&url, &request).await?;
        Ok(into_chunk_stream(response))
    }

    fn get_default_model(&self) -> &'static str {
        DEFAULT_MODEL
    }
}
