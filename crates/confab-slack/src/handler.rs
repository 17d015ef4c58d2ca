//! The mention pipeline: one `app_mention` event in, one threaded reply out.

use async_trait::async_trait;
use tracing::{debug, info};

use confab_core::config::{OpenAiSettings, SlackConfig};
use confab_relay::openai::OpenAiClient;
use confab_relay::prompt::build_thread_prompt;
use confab_relay::relay::{relay_completion, PublishError, RelayError, ReplyHandle, ReplySink};
use confab_relay::CompletionError;

use crate::client::SlackClient;
use crate::error::SlackError;
use crate::event::MentionEvent;

/// Which pipeline stage failed for one mention.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("upstream fetch failed: {0}")]
    UpstreamFetch(#[source] SlackError),

    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

impl From<RelayError> for BridgeError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Completion(e) => BridgeError::Completion(e),
            RelayError::Publish(e) => BridgeError::Publish(e),
        }
    }
}

/// Everything one mention needs: the two API clients plus the bot identity
/// and limits from config. Built once at startup, shared across events.
pub struct MentionBridge {
    slack: SlackClient,
    completions: OpenAiClient,
    settings: OpenAiSettings,
    bot_member_id: String,
    transcript_limit: u32,
}

impl MentionBridge {
    pub fn new(slack_config: &SlackConfig, settings: OpenAiSettings) -> Self {
        Self {
            slack: SlackClient::new(
                slack_config.bot_token.clone(),
                Some(slack_config.api_base.clone()),
            ),
            completions: OpenAiClient::from_settings(&settings),
            bot_member_id: slack_config.bot_member_id.clone(),
            transcript_limit: slack_config.transcript_limit,
            settings,
        }
    }

    /// Run the full pipeline for one mention:
    /// 1. Resolve the thread root for the triggering message.
    /// 2. Fetch the thread transcript.
    /// 3. Map it onto the completion prompt.
    /// 4. Relay the completion, replying into the resolved thread.
    ///
    /// Stages run strictly in order; the first failure aborts the event.
    pub async fn handle_mention(&self, event: &MentionEvent) -> Result<(), BridgeError> {
        debug!(channel = %event.channel, ts = %event.event_ts, "handling mention");

        let thread_ts = self
            .slack
            .resolve_thread_root(&event.channel, &event.event_ts)
            .await
            .map_err(BridgeError::UpstreamFetch)?;

        let transcript = self
            .slack
            .fetch_transcript(&event.channel, &thread_ts, self.transcript_limit)
            .await
            .map_err(BridgeError::UpstreamFetch)?;
        debug!(thread = %thread_ts, messages = transcript.len(), "transcript fetched");

        let prompt = build_thread_prompt(&transcript, &self.bot_member_id);

        let sink = ThreadSink {
            client: &self.slack,
            channel: &event.channel,
            thread_ts: &thread_ts,
        };
        let reply = relay_completion(&self.completions, &sink, prompt, &self.settings).await?;

        info!(
            channel = %event.channel,
            thread = %thread_ts,
            chars = reply.len(),
            stream = self.settings.stream,
            "mention answered"
        );
        Ok(())
    }
}

/// [`ReplySink`] bound to one channel and thread anchor.
struct ThreadSink<'a> {
    client: &'a SlackClient,
    channel: &'a str,
    thread_ts: &'a str,
}

#[async_trait]
impl ReplySink for ThreadSink<'_> {
    async fn post(&self, text: &str) -> Result<ReplyHandle, PublishError> {
        let ts = self
            .client
            .post_message(self.channel, self.thread_ts, text)
            .await
            .map_err(|e| PublishError::new(e.to_string()))?;
        Ok(ReplyHandle(ts))
    }

    async fn update(&self, handle: &ReplyHandle, text: &str) -> Result<(), PublishError> {
        self.client
            .update_message(self.channel, &handle.0, text)
            .await
            .map_err(|e| PublishError::new(e.to_string()))
    }
}
