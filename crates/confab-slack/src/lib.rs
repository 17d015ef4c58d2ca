//! Slack adapter: Events API payloads, request-signature verification, the
//! Web API client, and the mention pipeline that ties them to the relay.

pub mod client;
pub mod error;
pub mod event;
pub mod handler;
pub mod signature;

pub use client::SlackClient;
pub use error::SlackError;
pub use event::{CallbackEvent, EventEnvelope, MentionEvent};
pub use handler::{BridgeError, MentionBridge};
