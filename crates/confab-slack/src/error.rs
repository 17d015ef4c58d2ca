use thiserror::Error;

/// Errors from the Slack Web API client.
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Slack {method} failed: {message}")]
    Api {
        method: &'static str,
        message: String,
    },

    #[error("failed to decode Slack {method} response: {message}")]
    Decode {
        method: &'static str,
        message: String,
    },

    #[error("thread lookup for {ts} returned no messages")]
    EmptyThread { ts: String },

    #[error("Slack {method} response carries no ts")]
    MissingTs { method: &'static str },
}
