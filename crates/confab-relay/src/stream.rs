use serde::Deserialize;

/// Token usage reported by the completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// One decoded chunk from a streaming completion.
///
/// Either field can be absent: content arrives delta by delta, and usage
/// shows up once, on a dedicated chunk near the end of the stream.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub delta: Option<String>,
    pub usage: Option<UsageStats>,
}

/// Events emitted on the streaming channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A decoded chunk (content delta and/or usage).
    Chunk(Chunk),

    /// Transport failure mid-stream.
    Error { message: String },
}

/// Parse a single SSE line from the completions API, returning the data
/// payload. The protocol only uses `data:` lines; anything else (comments,
/// event names) is skipped.
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ")
}
