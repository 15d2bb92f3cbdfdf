//! Fire-and-forget event publishing.
//!
//! Publishing never fails the caller. Skipped events are logged at debug,
//! delivery failures at warn, and each delivery runs on its own task.

use std::{fmt, sync::Arc};

use mockall::automock;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    auth::CallbackTokenService, clock::Clock, domain::tenants::TenantUuid,
    tenancy::CorrelationUuid,
};

use super::{OutboundEvent, WebhookConfig, WebhookEnvelope, WebhookPayload, WebhookTransport};

#[automock]
pub trait WebhookPublisher: Send + Sync {
    /// Queue `event` for delivery and return at once.
    ///
    /// Returns the delivery task when one was started, so callers that care
    /// (tests, graceful shutdown) can wait for it.
    fn publish(&self, event: OutboundEvent) -> Option<JoinHandle<()>>;
}

/// Render `payload` and hand it to `publisher`. A payload that cannot be
/// rendered is logged and dropped.
pub fn publish_payload<P: WebhookPayload>(
    publisher: &dyn WebhookPublisher,
    payload: &P,
) -> Option<JoinHandle<()>> {
    match OutboundEvent::from_payload(payload) {
        Ok(event) => publisher.publish(event),
        Err(error) => {
            warn!(event_type = P::EVENT_TYPE, error = %error, "failed to render webhook payload");

            None
        }
    }
}

#[derive(Clone)]
pub struct HttpWebhookPublisher {
    config: Arc<WebhookConfig>,
    transport: Arc<dyn WebhookTransport>,
    tokens: CallbackTokenService,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for HttpWebhookPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpWebhookPublisher")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl HttpWebhookPublisher {
    #[must_use]
    pub fn new(
        config: WebhookConfig,
        transport: Arc<dyn WebhookTransport>,
        tokens: CallbackTokenService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            tokens,
            clock,
        }
    }

    fn envelope(&self, event: OutboundEvent) -> Option<WebhookEnvelope> {
        let correlation = CorrelationUuid::new();

        let tenant = event.tenant.unwrap_or_else(|| {
            warn!(
                event_type = event.event_type,
                correlation_uuid = %correlation,
                "webhook payload has no tenant, publishing with the system tenant"
            );

            TenantUuid::from_uuid(uuid::Uuid::nil())
        });

        let callback_token = match self.tokens.issue(tenant, correlation) {
            Ok(token) => token,
            Err(error) => {
                warn!(
                    event_type = event.event_type,
                    error = %error,
                    "failed to mint callback token, dropping webhook"
                );

                return None;
            }
        };

        Some(WebhookEnvelope {
            event_type: event.event_type.to_string(),
            timestamp: self.clock.now(),
            correlation_id: correlation,
            callback_token,
            payload: event.payload,
        })
    }
}

impl WebhookPublisher for HttpWebhookPublisher {
    fn publish(&self, event: OutboundEvent) -> Option<JoinHandle<()>> {
        let Some(url) = self.config.url_for(event.event_type) else {
            debug!(
                event_type = event.event_type,
                "webhooks disabled or event unrouted, skipping"
            );

            return None;
        };

        let Ok(runtime) = Handle::try_current() else {
            warn!(
                event_type = event.event_type,
                "no async runtime available, dropping webhook"
            );

            return None;
        };

        let envelope = self.envelope(event)?;
        let transport = Arc::clone(&self.transport);
        let timeout = self.config.timeout;

        Some(runtime.spawn(async move {
            let event_type = envelope.event_type.as_str();
            let correlation = envelope.correlation_id;

            match tokio::time::timeout(timeout, transport.deliver(&url, &envelope)).await {
                Ok(Ok(())) => {
                    info!(event_type, correlation_uuid = %correlation, url = %url, "webhook delivered");
                }
                Ok(Err(error)) => {
                    warn!(
                        event_type,
                        correlation_uuid = %correlation,
                        url = %url,
                        error = %error,
                        "webhook delivery failed"
                    );
                }
                Err(_elapsed) => {
                    warn!(
                        event_type,
                        correlation_uuid = %correlation,
                        url = %url,
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "webhook delivery timed out"
                    );
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use jiff::Timestamp;
    use serde::Serialize;
    use testresult::TestResult;

    use crate::{
        clock::ManualClock,
        domain::shipments::{ShipmentStatus, ShipmentUuid},
        test::helpers::signing_config,
        webhooks::{MockWebhookTransport, WebhookError, events::ShipmentCreated},
    };

    use super::*;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Timestamp::from_second(1_800_000_000).unwrap_or(Timestamp::UNIX_EPOCH),
        ))
    }

    fn enabled() -> TestResult<WebhookConfig> {
        Ok(WebhookConfig {
            enabled: true,
            base_url: Some("https://automation.example.test".to_string()),
            timeout: Duration::from_millis(200),
            routes: WebhookConfig::parse_routes("shipment.created=/webhook/shipments")?,
            ..WebhookConfig::default()
        })
    }

    fn publisher(
        config: WebhookConfig,
        transport: impl WebhookTransport + 'static,
        clock: Arc<ManualClock>,
    ) -> HttpWebhookPublisher {
        HttpWebhookPublisher::new(
            config,
            Arc::new(transport),
            CallbackTokenService::new(&signing_config(), clock.clone()),
            clock,
        )
    }

    fn shipment_created(tenant: TenantUuid) -> TestResult<OutboundEvent> {
        Ok(OutboundEvent::from_payload(&ShipmentCreated {
            tenant_id: Some(tenant),
            shipment_id: ShipmentUuid::new(),
            tracking_number: "WB-1001".to_string(),
            status: ShipmentStatus::Booked,
        })?)
    }

    #[derive(Serialize)]
    struct Heartbeat;

    impl WebhookPayload for Heartbeat {
        const EVENT_TYPE: &'static str = "shipment.created";

        fn tenant(&self) -> Option<TenantUuid> {
            None
        }
    }

    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait]
    impl WebhookTransport for StalledTransport {
        async fn deliver(&self, _url: &str, _envelope: &WebhookEnvelope) -> Result<(), WebhookError> {
            tokio::time::sleep(Duration::from_secs(30)).await;

            Ok(())
        }
    }

    #[tokio::test]
    async fn disabled_delivery_makes_no_calls() -> TestResult {
        let mut transport = MockWebhookTransport::new();
        transport.expect_deliver().never();

        let publisher = publisher(WebhookConfig::disabled(), transport, clock());

        assert!(publisher.publish(shipment_created(TenantUuid::new())?).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn unrouted_events_make_no_calls() -> TestResult {
        let mut transport = MockWebhookTransport::new();
        transport.expect_deliver().never();

        let config = WebhookConfig {
            routes: WebhookConfig::parse_routes("shipment.exception=/webhook/exceptions")?,
            ..enabled()?
        };

        let publisher = publisher(config, transport, clock());

        assert!(publisher.publish(shipment_created(TenantUuid::new())?).is_none());

        Ok(())
    }

    #[tokio::test]
    async fn delivered_envelopes_carry_a_token_for_their_tenant() -> TestResult {
        let clock = clock();
        let tenant = TenantUuid::new();
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let mut transport = MockWebhookTransport::new();
        let sink = Arc::clone(&delivered);

        transport
            .expect_deliver()
            .withf(|url, _| url == "https://automation.example.test/webhook/shipments")
            .times(1)
            .returning(move |_, envelope| {
                if let Ok(mut sink) = sink.lock() {
                    sink.push(envelope.clone());
                }

                Ok(())
            });

        let publisher = publisher(enabled()?, transport, clock.clone());

        publisher
            .publish(shipment_created(tenant)?)
            .ok_or("delivery should have started")?
            .await?;

        let envelope = delivered
            .lock()
            .map_err(|_poisoned| "sink poisoned")?
            .pop()
            .ok_or("nothing was delivered")?;

        assert_eq!(envelope.event_type, "shipment.created");
        assert_eq!(envelope.timestamp, clock.now());
        assert_eq!(envelope.payload["tracking_number"], "WB-1001");

        let claims = CallbackTokenService::new(&signing_config(), clock)
            .validate(&envelope.callback_token)
            .ok_or("callback token should validate")?;

        assert_eq!(claims.tenant, tenant);
        assert_eq!(claims.correlation, envelope.correlation_id);

        Ok(())
    }

    #[tokio::test]
    async fn each_event_gets_a_fresh_correlation() -> TestResult {
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let mut transport = MockWebhookTransport::new();
        let sink = Arc::clone(&delivered);

        transport.expect_deliver().times(2).returning(move |_, envelope| {
            if let Ok(mut sink) = sink.lock() {
                sink.push(envelope.correlation_id);
            }

            Ok(())
        });

        let publisher = publisher(enabled()?, transport, clock());
        let tenant = TenantUuid::new();

        for _ in 0..2 {
            publisher
                .publish(shipment_created(tenant)?)
                .ok_or("delivery should have started")?
                .await?;
        }

        let correlations = delivered.lock().map_err(|_poisoned| "sink poisoned")?;

        assert_eq!(correlations.len(), 2);
        assert_ne!(correlations.first(), correlations.get(1));

        Ok(())
    }

    #[tokio::test]
    async fn payloads_without_a_tenant_use_the_system_tenant() -> TestResult {
        let clock = clock();
        let delivered = Arc::new(Mutex::new(Vec::new()));

        let mut transport = MockWebhookTransport::new();
        let sink = Arc::clone(&delivered);

        transport.expect_deliver().times(1).returning(move |_, envelope| {
            if let Ok(mut sink) = sink.lock() {
                sink.push(envelope.callback_token.clone());
            }

            Ok(())
        });

        let publisher = publisher(enabled()?, transport, clock.clone());

        publisher
            .publish(OutboundEvent::from_payload(&Heartbeat)?)
            .ok_or("delivery should have started")?
            .await?;

        let token = delivered
            .lock()
            .map_err(|_poisoned| "sink poisoned")?
            .pop()
            .ok_or("nothing was delivered")?;

        let claims = CallbackTokenService::new(&signing_config(), clock)
            .validate(&token)
            .ok_or("callback token should validate")?;

        assert!(claims.tenant.is_nil());

        Ok(())
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() -> TestResult {
        let mut transport = MockWebhookTransport::new();

        transport.expect_deliver().times(1).returning(|_, _| {
            Err(WebhookError::UnexpectedStatus {
                status: 502,
                body: "bad gateway".to_string(),
            })
        });

        let publisher = publisher(enabled()?, transport, clock());

        publisher
            .publish(shipment_created(TenantUuid::new())?)
            .ok_or("delivery should have started")?
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn stalled_deliveries_are_abandoned_after_the_timeout() -> TestResult {
        let publisher = publisher(enabled()?, StalledTransport, clock());

        let handle = publisher
            .publish(shipment_created(TenantUuid::new())?)
            .ok_or("delivery should have started")?;

        tokio::time::timeout(Duration::from_secs(5), handle).await??;

        Ok(())
    }
}
