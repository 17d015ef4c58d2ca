use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use confab_core::config::OpenAiSettings;

use crate::prompt::Message;
use crate::stream::{parse_sse_line, Chunk, StreamEvent, UsageStats};

/// Errors from the completion API.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("stream error: {0}")]
    Stream(String),
}

/// A chat-completion request: the model plus the ordered prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Non-streaming response: the first choice's content plus usage when the
/// API reported it.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: Option<UsageStats>,
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".to_string()),
        }
    }

    pub fn from_settings(settings: &OpenAiSettings) -> Self {
        Self::new(settings.api_key.clone(), Some(settings.base_url.clone()))
    }

    /// Send a request and wait for the complete response.
    pub async fn send(&self, req: &CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        let body = build_request_body(req, false);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %req.model, "sending completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "completion API error");
            return Err(CompletionError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| CompletionError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }

    /// Send a streaming request; decoded chunks flow through `tx` until the
    /// stream ends. Resolving `Ok` only means the request was accepted and
    /// the pump ran — mid-stream failures surface as [`StreamEvent::Error`].
    pub async fn send_stream(
        &self,
        req: &CompletionRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), CompletionError> {
        let body = build_request_body(req, true);
        let url = format!("{}/v1/chat/completions", self.base_url);

        debug!(model = %req.model, "sending streaming completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "streaming completion API error");
            return Err(CompletionError::Api {
                status,
                message: text,
            });
        }

        process_stream(resp, tx).await;
        Ok(())
    }
}

fn build_request_body(req: &CompletionRequest, stream: bool) -> serde_json::Value {
    if stream {
        // stream_options asks the API to attach usage to the final chunk.
        serde_json::json!({
            "model": req.model,
            "messages": req.messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        })
    } else {
        serde_json::json!({
            "model": req.model,
            "messages": req.messages,
        })
    }
}

fn parse_response(resp: ApiResponse) -> CompletionResponse {
    let content = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    CompletionResponse {
        content,
        usage: resp.usage,
    }
}

/// Decode one SSE data payload into a [`Chunk`]. Returns `None` for chunks
/// that carry neither content nor usage (role priming, finish markers).
fn decode_stream_chunk(data: &str) -> Option<Chunk> {
    let wire: StreamChunk = serde_json::from_str(data).ok()?;
    let delta = wire
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|s| !s.is_empty());
    let usage = wire.usage;
    if delta.is_none() && usage.is_none() {
        return None;
    }
    Some(Chunk { delta, usage })
}

/// Pump the SSE response into the channel. A network read can end mid-line,
/// or even mid-way through a multi-byte UTF-8 character, so the carry buffer
/// holds raw bytes and lines are split out on `\n` before any UTF-8
/// conversion. `data: [DONE]` signals end-of-stream.
async fn process_stream(resp: reqwest::Response, tx: mpsc::Sender<StreamEvent>) {
    use futures_util::StreamExt;

    let mut line_buf: Vec<u8> = Vec::new();
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error {
                        message: e.to_string(),
                    })
                    .await;
                return;
            }
        };

        line_buf.extend_from_slice(&chunk);

        while let Some(pos) = line_buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = line_buf.drain(..=pos).collect();
            let Ok(line) = std::str::from_utf8(&line) else {
                continue;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(data) = parse_sse_line(line) {
                if data.trim() == "[DONE]" {
                    return;
                }

                if let Some(decoded) = decode_stream_chunk(data) {
                    if tx.send(StreamEvent::Chunk(decoded)).await.is_err() {
                        return; // receiver dropped
                    }
                }
            }
        }
    }
}

// Completion API response types (private — deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    usage: Option<UsageStats>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

// Streaming chunk types

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
    usage: Option<UsageStats>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
