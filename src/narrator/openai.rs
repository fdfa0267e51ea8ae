//! OpenAI-compatible chat completions narrator.
//!
//! Works with any server exposing `/chat/completions` with server-sent
//! event streaming (OpenAI, Azure deployments behind a proxy, Ollama, vLLM).

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{FragmentStream, NarrationRequest, Narrator};
use crate::config::NarratorConfig;
use crate::error::NarratorError;

pub struct OpenAiNarrator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl OpenAiNarrator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a narrator from config, reading the key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`NarratorError::Configuration`] when the key variable is unset.
    pub fn from_config(config: &NarratorConfig) -> Result<Self, NarratorError> {
        let api_key = config.api_key().ok_or_else(|| {
            NarratorError::Configuration(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        let mut narrator = Self::new(api_key, &config.model)
            .with_base_url(&config.base_url)
            .with_timeout(Duration::from_secs(config.timeout_secs));
        narrator.temperature = config.temperature;
        narrator.max_tokens = config.max_tokens;
        Ok(narrator)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn to_chat_request<'a>(&'a self, request: &'a NarrationRequest) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }
}

#[async_trait]
impl Narrator for OpenAiNarrator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn narrate(&self, request: NarrationRequest) -> Result<FragmentStream, NarratorError> {
        let response = self
            .client
            .post(self.chat_url())
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&self.to_chat_request(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => NarratorError::Authentication(text),
                429 => NarratorError::RateLimited(text),
                code => NarratorError::Api {
                    status: code,
                    message: text,
                },
            });
        }

        let bytes = response
            .bytes_stream()
            .map_err(|e| NarratorError::Stream(e.to_string()));

        Ok(sse_fragments(bytes))
    }
}

/// Turns a raw server-sent event byte stream into text fragments.
///
/// Bytes are buffered until a full line is available, so a multibyte
/// character split across network chunks is decoded intact.
fn sse_fragments<S, B>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, NarratorError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    stream::unfold(
        (Box::pin(bytes), Vec::<u8>::new(), false),
        |(mut bytes, mut buffer, done)| async move {
            if done {
                return None;
            }
            loop {
                if let Some(line_end) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=line_end).collect();
                    match parse_sse_line(&String::from_utf8_lossy(&line)) {
                        Some(SseEvent::Delta(text)) => {
                            return Some((Ok(text), (bytes, buffer, false)))
                        }
                        Some(SseEvent::Done) => return None,
                        None => continue,
                    }
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => return Some((Err(e), (bytes, buffer, true))),
                    None => {
                        // Flush a final line that arrived without a newline.
                        let line = String::from_utf8_lossy(&buffer).into_owned();
                        if line.trim().is_empty() {
                            return None;
                        }
                        buffer.clear();
                        return match parse_sse_line(&line) {
                            Some(SseEvent::Delta(text)) => {
                                Some((Ok(text), (bytes, buffer, true)))
                            }
                            _ => None,
                        };
                    }
                }
            }
        },
    )
    .boxed()
}

#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Delta(String),
    Done,
}

/// Interprets one server-sent event line.
///
/// Returns `None` for blank lines, comments, non-data fields, chunks that
/// carry no text, and data that is not valid JSON.
fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let chunk: ChatChunk = serde_json::from_str(data).ok()?;
    let text = chunk.choices.into_iter().next()?.delta.content?;
    if text.is_empty() {
        None
    } else {
        Some(SseEvent::Delta(text))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sse_delta() {
        let line = r#"data: {"id":"x","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        assert_eq!(
            parse_sse_line(line),
            Some(SseEvent::Delta("Hello".to_string()))
        );
    }

    #[test]
    fn test_parse_sse_role_only_chunk() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_line(line), None);
    }

    #[test]
    fn test_parse_sse_done_and_noise() {
        assert_eq!(parse_sse_line("data: [DONE]\n"), Some(SseEvent::Done));
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("event: ping"), None);
        assert_eq!(parse_sse_line("data: not json"), None);
    }

    async fn collect(
        chunks: Vec<Result<Vec<u8>, NarratorError>>,
    ) -> Vec<Result<String, NarratorError>> {
        sse_fragments(stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn test_sse_multibyte_char_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"PHI \u{e9}t\u{e9}\"}}]}\n\n";
        let bytes = line.as_bytes();
        let split = line.find('\u{e9}').unwrap() + 1;

        let fragments = collect(vec![
            Ok(bytes[..split].to_vec()),
            Ok(bytes[split..].to_vec()),
        ])
        .await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "PHI \u{e9}t\u{e9}");
    }

    #[tokio::test]
    async fn test_sse_stops_at_done_and_flushes_trailing_line() {
        let fragments = collect(vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n".to_vec()),
        ])
        .await;
        let texts: Vec<String> = fragments.into_iter().map(Result::unwrap).collect();
        assert_eq!(texts, vec!["a"]);

        let fragments = collect(vec![Ok(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}".to_vec(),
        )])
        .await;
        assert_eq!(fragments[0].as_ref().unwrap(), "tail");
    }

    #[tokio::test]
    async fn test_sse_transport_error_ends_stream() {
        let fragments = collect(vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n".to_vec()),
            Err(NarratorError::Stream("reset".to_string())),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n".to_vec()),
        ])
        .await;
        assert_eq!(fragments.len(), 2);
        assert!(matches!(fragments[1], Err(NarratorError::Stream(_))));
    }

    #[test]
    fn test_chat_request_shape() {
        let narrator = OpenAiNarrator::new("key", "gpt-4o-mini");
        let request = NarrationRequest::new("sys", "user prompt");
        let value = serde_json::to_value(narrator.to_chat_request(&request)).unwrap();

        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "user prompt");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_url_trims_slash() {
        let narrator = OpenAiNarrator::new("key", "m").with_base_url("http://localhost:11434/v1/");
        assert_eq!(narrator.chat_url(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = NarratorConfig {
            api_key_env: "REPOAUDIT_TEST_MISSING_KEY".to_string(),
            ..NarratorConfig::default()
        };
        let err = OpenAiNarrator::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("REPOAUDIT_TEST_MISSING_KEY"));
    }
}
