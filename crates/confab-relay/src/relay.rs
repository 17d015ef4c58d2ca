//! Relay a completion into a chat reply, in batch or streaming mode.
//!
//! Batch mode asks for the full response and posts it once. Streaming mode
//! posts a placeholder immediately, then edits it in place as content
//! arrives — throttled to one edit per flush interval, because the chat
//! platform rate-limits message updates far below token cadence.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use confab_core::config::OpenAiSettings;

use crate::openai::{CompletionError, CompletionRequest, OpenAiClient};
use crate::prompt::Message;
use crate::stream::{Chunk, StreamEvent, UsageStats};

/// Initial text of the streaming placeholder message.
pub const PLACEHOLDER_TEXT: &str = "Thinking...";
/// Appended to intermediate updates while the stream is still open.
pub const CONTINUATION_MARKER: &str = "•";
/// Minimum time between in-place edits of the reply.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(3);

const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Platform handle of a posted reply; edits target it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHandle(pub String);

/// Error from a [`ReplySink`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PublishError(String);

impl PublishError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Where the relay publishes. Implementations carry the destination
/// (channel, thread anchor) baked in; the relay only decides what text to
/// show and when. Defined here so channel adapters depend on this crate,
/// never the reverse.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Create the reply message; the returned handle is reused for edits.
    async fn post(&self, text: &str) -> Result<ReplyHandle, PublishError>;

    /// Edit a previously posted message in place.
    async fn update(&self, handle: &ReplyHandle, text: &str) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Run one completion for `messages` and publish the reply through `sink`.
/// Mode is picked from `settings.stream`. Returns the final published text.
pub async fn relay_completion(
    client: &OpenAiClient,
    sink: &dyn ReplySink,
    messages: Vec<Message>,
    settings: &OpenAiSettings,
) -> Result<String, RelayError> {
    let request = CompletionRequest {
        model: settings.model.clone(),
        messages,
    };

    if settings.stream {
        relay_streaming(client, sink, &request).await
    } else {
        relay_batch(client, sink, &request).await
    }
}

async fn relay_batch(
    client: &OpenAiClient,
    sink: &dyn ReplySink,
    request: &CompletionRequest,
) -> Result<String, RelayError> {
    let started = Instant::now();
    let response = client.send(request).await?;

    let mut text = response.content;
    text.push_str(&format_trailer(started.elapsed(), response.usage.as_ref()));

    sink.post(&text).await?;
    Ok(text)
}

async fn relay_streaming(
    client: &OpenAiClient,
    sink: &dyn ReplySink,
    request: &CompletionRequest,
) -> Result<String, RelayError> {
    let started = Instant::now();

    // Reserve the reply slot before opening the stream; every later edit
    // targets this handle.
    let handle = sink.post(PLACEHOLDER_TEXT).await?;

    let (tx, rx) = mpsc::channel::<StreamEvent>(STREAM_CHANNEL_CAPACITY);
    let send_fut = client.send_stream(request, tx);

    drive_stream(rx, send_fut, sink, &handle, started, FLUSH_INTERVAL).await
}

/// Consume the stream, flushing intermediate snapshots through the sink,
/// then finalize the reply with the trailer. The final update always runs,
/// even when the gate never opened and the placeholder still shows its
/// initial text.
async fn drive_stream<F>(
    mut rx: mpsc::Receiver<StreamEvent>,
    send_fut: F,
    sink: &dyn ReplySink,
    handle: &ReplyHandle,
    started: Instant,
    flush_interval: Duration,
) -> Result<String, RelayError>
where
    F: Future<Output = Result<(), CompletionError>>,
{
    tokio::pin!(send_fut);

    let mut acc = StreamingAccumulator::new(started, flush_interval);

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(StreamEvent::Chunk(chunk)) => {
                        if let Some(snapshot) = acc.absorb(chunk, Instant::now()) {
                            debug!(len = snapshot.len(), "intermediate flush");
                            sink.update(handle, &snapshot).await?;
                        }
                    }
                    Some(StreamEvent::Error { message }) => {
                        // Whatever the placeholder shows stays; no rollback.
                        return Err(CompletionError::Stream(message).into());
                    }
                    None => break,
                }
            }
            result = &mut send_fut => {
                result?;
                // Sender side is done; drain whatever it queued.
                while let Ok(event) = rx.try_recv() {
                    match event {
                        StreamEvent::Chunk(chunk) => {
                            if let Some(snapshot) = acc.absorb(chunk, Instant::now()) {
                                debug!(len = snapshot.len(), "intermediate flush");
                                sink.update(handle, &snapshot).await?;
                            }
                        }
                        StreamEvent::Error { message } => {
                            return Err(CompletionError::Stream(message).into());
                        }
                    }
                }
                break;
            }
        }
    }

    let usage = acc.usage();
    let mut text = acc.into_text();
    text.push_str(&format_trailer(started.elapsed(), usage.as_ref()));

    sink.update(handle, &text).await?;
    Ok(text)
}

/// State of one streaming relay: accumulated content, the flush clock, and
/// the last usage record seen. Lives for exactly one relay call.
#[derive(Debug)]
struct StreamingAccumulator {
    text: String,
    usage: Option<UsageStats>,
    last_flush: Instant,
    flush_interval: Duration,
}

impl StreamingAccumulator {
    fn new(start: Instant, flush_interval: Duration) -> Self {
        Self {
            text: String::new(),
            usage: None,
            last_flush: start,
            flush_interval,
        }
    }

    /// Absorb one chunk at time `now`. Returns the snapshot to flush (the
    /// accumulated text plus the continuation marker) when the gate opens —
    /// strictly more than `flush_interval` since the last flush — `None`
    /// otherwise.
    fn absorb(&mut self, chunk: Chunk, now: Instant) -> Option<String> {
        if let Some(delta) = chunk.delta {
            self.text.push_str(&delta);
        }
        // Last non-null usage wins; chunks without usage never clear it.
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage);
        }

        if now.duration_since(self.last_flush) > self.flush_interval {
            self.last_flush = now;
            Some(format!("{} {}", self.text, CONTINUATION_MARKER))
        } else {
            None
        }
    }

    fn usage(&self) -> Option<UsageStats> {
        self.usage
    }

    fn into_text(self) -> String {
        self.text
    }
}

/// Reply trailer: elapsed wall-clock seconds, plus token counts when the
/// API reported usage.
pub fn format_trailer(elapsed: Duration, usage: Option<&UsageStats>) -> String {
    let secs = elapsed.as_secs_f64();
    match usage {
        Some(u) => format!(
            "\n\nelapsed: {:.2} seconds, prompt tokens: {}, completion tokens: {}",
            secs, u.prompt_tokens, u.completion_tokens
        ),
        None => format!("\n\nelapsed: {secs:.2} seconds"),
    }
}
