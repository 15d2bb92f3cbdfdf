//! HTTP delivery of webhook envelopes.

use async_trait::async_trait;
use mockall::automock;
use reqwest::{Client, header::AUTHORIZATION};

use super::{WebhookConfig, WebhookError, WebhookEnvelope};

#[automock]
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    /// POST `envelope` to `url`. Any non-2xx response is an error.
    async fn deliver(&self, url: &str, envelope: &WebhookEnvelope) -> Result<(), WebhookError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    api_key: Option<String>,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        Ok(Self {
            http: Client::builder().timeout(config.timeout).build()?,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn deliver(&self, url: &str, envelope: &WebhookEnvelope) -> Result<(), WebhookError> {
        let mut request = self.http.post(url).json(envelope);

        if let Some(api_key) = &self.api_key {
            request = request.header(AUTHORIZATION, api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            return Err(WebhookError::UnexpectedStatus { status, body });
        }

        Ok(())
    }
}
