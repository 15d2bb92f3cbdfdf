//! Outbound event delivery to the automation host.

mod config;
mod errors;
pub mod events;
mod publisher;
mod transport;

pub use config::WebhookConfig;
pub use errors::WebhookError;
pub use events::{OutboundEvent, WebhookEnvelope, WebhookPayload};
pub use publisher::{HttpWebhookPublisher, MockWebhookPublisher, WebhookPublisher, publish_payload};
pub use transport::{MockWebhookTransport, ReqwestTransport, WebhookTransport};
