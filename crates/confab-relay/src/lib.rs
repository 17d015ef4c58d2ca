//! Completion relay: the chat-completions client (batch and SSE streaming),
//! the transcript prompt builder, and the relay loop that paces in-place
//! reply edits.

pub mod openai;
pub mod prompt;
pub mod relay;
pub mod stream;

pub use openai::{CompletionError, CompletionRequest, CompletionResponse, OpenAiClient};
pub use prompt::{build_thread_prompt, Message, Role, TranscriptEntry};
pub use relay::{relay_completion, PublishError, RelayError, ReplyHandle, ReplySink};
pub use stream::{Chunk, StreamEvent, UsageStats};
