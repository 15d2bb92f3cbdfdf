//! Webhook errors.

use thiserror::Error;

use crate::auth::TokenError;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// A route entry that is not `event_type=path`.
    #[error("invalid webhook route `{0}`")]
    InvalidRoute(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("automation host responded with status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("event payload could not be serialized")]
    Payload(#[source] serde_json::Error),

    #[error("callback token could not be issued")]
    Token(#[source] TokenError),
}
