//! Slack Web API client — thread lookup, transcript listing, and reply
//! posting/editing. All methods authenticate with the bot token and go
//! through the `{ok, error}` response envelope.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use confab_relay::prompt::TranscriptEntry;

use crate::error::SlackError;

#[derive(Clone)]
pub struct SlackClient {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(bot_token: String, api_base: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.unwrap_or_else(|| "https://slack.com/api".to_string()),
            bot_token,
        }
    }

    /// Resolve the canonical thread root for an event timestamp.
    ///
    /// Looks the message up with a single-result `conversations.replies`
    /// call and applies [`thread_root_of`].
    pub async fn resolve_thread_root(
        &self,
        channel: &str,
        event_ts: &str,
    ) -> Result<String, SlackError> {
        let mut messages = self.conversations_replies(channel, event_ts, 1).await?;
        let first = messages.drain(..).next().ok_or_else(|| SlackError::EmptyThread {
            ts: event_ts.to_string(),
        })?;
        Ok(thread_root_of(&first, event_ts))
    }

    /// Fetch the thread transcript, oldest first, capped at `limit` by the
    /// platform.
    pub async fn fetch_transcript(
        &self,
        channel: &str,
        thread_ts: &str,
        limit: u32,
    ) -> Result<Vec<TranscriptEntry>, SlackError> {
        let messages = self.conversations_replies(channel, thread_ts, limit).await?;
        Ok(messages
            .into_iter()
            .map(|m| TranscriptEntry {
                // Integration-authored messages can lack a user id; an empty
                // author matches no prompt rule and falls out downstream.
                author_id: m.user.unwrap_or_default(),
                text: m.text,
                ts: m.ts,
            })
            .collect())
    }

    /// `chat.postMessage` threaded under `thread_ts`; returns the new
    /// message's `ts`, the handle later edits target.
    pub async fn post_message(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<String, SlackError> {
        const METHOD: &str = "chat.postMessage";
        let payload = json!({
            "channel": channel,
            "thread_ts": thread_ts,
            "text": text,
        });

        let resp = self
            .client
            .post(format!("{}/{METHOD}", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await?;

        let envelope: MessageResponse = decode(METHOD, resp).await?;
        ensure_ok(METHOD, envelope.ok, envelope.error)?;

        debug!(channel, thread = thread_ts, "reply posted");
        envelope.ts.ok_or(SlackError::MissingTs { method: METHOD })
    }

    /// `chat.update` — replace the text of a previously posted message.
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), SlackError> {
        const METHOD: &str = "chat.update";
        let payload = json!({
            "channel": channel,
            "ts": ts,
            "text": text,
        });

        let resp = self
            .client
            .post(format!("{}/{METHOD}", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&payload)
            .send()
            .await?;

        let envelope: MessageResponse = decode(METHOD, resp).await?;
        ensure_ok(METHOD, envelope.ok, envelope.error)?;

        debug!(channel, ts, "reply updated");
        Ok(())
    }

    async fn conversations_replies(
        &self,
        channel: &str,
        ts: &str,
        limit: u32,
    ) -> Result<Vec<ReplyMessage>, SlackError> {
        const METHOD: &str = "conversations.replies";
        let resp = self
            .client
            .get(format!("{}/{METHOD}", self.api_base))
            .bearer_auth(&self.bot_token)
            .query(&[("channel", channel), ("ts", ts), ("limit", &limit.to_string())])
            .send()
            .await?;

        let envelope: RepliesResponse = decode(METHOD, resp).await?;
        ensure_ok(METHOD, envelope.ok, envelope.error)?;

        debug!(channel, ts, count = envelope.messages.len(), "replies fetched");
        Ok(envelope.messages)
    }
}

/// Decode a Web API response body, folding HTTP-level failures into
/// [`SlackError::Api`] first.
async fn decode<T: DeserializeOwned>(
    method: &'static str,
    resp: reqwest::Response,
) -> Result<T, SlackError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SlackError::Api {
            method,
            message: format!("status {status}: {body}"),
        });
    }
    resp.json::<T>().await.map_err(|e| SlackError::Decode {
        method,
        message: e.to_string(),
    })
}

/// A message carrying `thread_ts` is a reply inside an existing thread and
/// that value is the root; otherwise the message itself starts the thread
/// and its own timestamp is the root.
fn thread_root_of(message: &ReplyMessage, event_ts: &str) -> String {
    message
        .thread_ts
        .clone()
        .unwrap_or_else(|| event_ts.to_string())
}

fn ensure_ok(method: &'static str, ok: bool, error: Option<String>) -> Result<(), SlackError> {
    if ok {
        Ok(())
    } else {
        Err(SlackError::Api {
            method,
            message: error.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

// Web API response envelopes (private — deserialization only)

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    error: Option<String>,
    #[serde(default)]
    messages: Vec<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    text: String,
    ts: String,
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    ok: bool,
    error: Option<String>,
    ts: Option<String>,
}
