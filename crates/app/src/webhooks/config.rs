//! Webhook routing configuration.

use std::{fmt, time::Duration};

use rustc_hash::FxHashMap;

use super::WebhookError;

/// Where, and whether, events are delivered.
#[derive(Clone)]
pub struct WebhookConfig {
    pub enabled: bool,

    /// Automation host base URL, e.g. `https://automation.example.com`.
    pub base_url: Option<String>,

    /// Sent as the `Authorization` header when present.
    pub api_key: Option<String>,

    /// Upper bound on a single delivery.
    pub timeout: Duration,

    /// Event type to path on the automation host.
    pub routes: FxHashMap<String, String>,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "**redacted**"))
            .field("timeout", &self.timeout)
            .field("routes", &self.routes)
            .finish()
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: None,
            api_key: None,
            timeout: Duration::from_secs(10),
            routes: FxHashMap::default(),
        }
    }
}

impl WebhookConfig {
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// The destination for `event_type`, or `None` when delivery is off or
    /// the event is unrouted.
    #[must_use]
    pub fn url_for(&self, event_type: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let base = self.base_url.as_deref()?.trim_end_matches('/');

        if base.is_empty() {
            return None;
        }

        let path = self.routes.get(event_type)?.trim();

        if path.is_empty() {
            return None;
        }

        Some(format!("{base}/{}", path.trim_start_matches('/')))
    }

    /// Parse `event_type=path` pairs separated by commas.
    ///
    /// # Errors
    ///
    /// Returns an error for an entry without `=` or with an empty side.
    pub fn parse_routes(routes: &str) -> Result<FxHashMap<String, String>, WebhookError> {
        routes
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (event_type, path) = entry
                    .split_once('=')
                    .map(|(event_type, path)| (event_type.trim(), path.trim()))
                    .filter(|(event_type, path)| !event_type.is_empty() && !path.is_empty())
                    .ok_or_else(|| WebhookError::InvalidRoute(entry.to_string()))?;

                Ok((event_type.to_string(), path.to_string()))
            })
            .collect()
    }
}
