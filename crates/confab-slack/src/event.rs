//! Events API payload types.

use serde::Deserialize;

/// Outer envelope of an Events API delivery, discriminated by `type`.
///
/// Only the two envelope kinds the bridge acts on are modeled; everything
/// else lands in `Other` and is acknowledged without processing.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum EventEnvelope {
    /// One-time endpoint ownership handshake: echo `challenge` back.
    #[serde(rename = "url_verification")]
    UrlVerification { challenge: String },

    /// A workspace event wrapped in the callback envelope.
    #[serde(rename = "event_callback")]
    EventCallback { event: CallbackEvent },

    #[serde(other)]
    Other,
}

/// The inner event of an `event_callback`, discriminated by `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum CallbackEvent {
    #[serde(rename = "app_mention")]
    AppMention(MentionEvent),

    #[serde(other)]
    Other,
}

/// An `app_mention` event — someone addressed the bot.
///
/// `channel`, `text` and `event_ts` are required; an event missing them is
/// rejected at decode time rather than faulting mid-pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct MentionEvent {
    pub channel: String,
    pub text: String,
    /// Timestamp of the triggering message; the thread lookup key.
    pub event_ts: String,
    /// Member id of whoever mentioned the bot. Absent for non-user authors.
    #[serde(default)]
    pub user: Option<String>,
}
