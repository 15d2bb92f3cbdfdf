//! Webhooks Config

use std::time::Duration;

use clap::Args;
use waybill_app::webhooks::{WebhookConfig, WebhookError};

/// Outbound webhook settings.
#[derive(Debug, Args)]
pub struct WebhooksConfig {
    /// Deliver events to the automation host
    #[arg(long, env = "WEBHOOKS_ENABLED", default_value_t = false)]
    pub webhooks_enabled: bool,

    /// Automation host base URL
    #[arg(long, env = "WEBHOOKS_BASE_URL")]
    pub webhooks_base_url: Option<String>,

    /// Sent as the `Authorization` header on every delivery
    #[arg(long, env = "WEBHOOKS_API_KEY", hide_env_values = true)]
    pub webhooks_api_key: Option<String>,

    /// Per-delivery timeout in seconds
    #[arg(long, env = "WEBHOOKS_TIMEOUT_SECONDS", default_value_t = 10_u64)]
    pub webhooks_timeout_seconds: u64,

    /// Comma-separated `event_type=path` pairs
    #[arg(long, env = "WEBHOOKS_ROUTES", default_value = "")]
    pub webhooks_routes: String,
}

impl WebhooksConfig {
    /// # Errors
    ///
    /// Returns an error if a route entry is not of the form `event=path`.
    pub fn webhook_config(&self) -> Result<WebhookConfig, WebhookError> {
        Ok(WebhookConfig {
            enabled: self.webhooks_enabled,
            base_url: self.webhooks_base_url.clone(),
            api_key: self
                .webhooks_api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            timeout: Duration::from_secs(self.webhooks_timeout_seconds),
            routes: WebhookConfig::parse_routes(&self.webhooks_routes)?,
        })
    }
}
