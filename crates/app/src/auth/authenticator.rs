//! Request-time gate for service credentials.
//!
//! A bearer token is always treated as a callback token and never falls
//! through to the service key check. Without one, the service key header is
//! hashed and looked up. Anything else is refused.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    auth::{
        callback::CallbackTokenService,
        errors::{AuthError, AuthFailure},
        keys::hash_service_key,
        models::ServiceApiKeyUuid,
        repository::ServiceKeyRepository,
        scopes::ServiceScopes,
    },
    clock::Clock,
    domain::tenants::TenantUuid,
    entity::Entity,
    tenancy::{ActorUuid, CorrelationUuid, RequestContext},
};

/// Header carrying a raw persistent service key.
pub const SERVICE_KEY_HEADER: &str = "x-service-key";

/// How long the detached last-used update may take.
pub const LAST_USED_TOUCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Credentials as presented on an inbound request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceCredentials {
    /// Raw `Authorization` header value.
    pub authorization: Option<String>,

    /// Raw [`SERVICE_KEY_HEADER`] value.
    pub service_key: Option<String>,

    /// Remote address, recorded as the key's last-used origin.
    pub origin: Option<String>,
}

impl ServiceCredentials {
    /// The token from a `Bearer` authorization header, if there is one.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        let (scheme, token) = self.authorization.as_deref()?.trim().split_once(' ')?;

        scheme
            .eq_ignore_ascii_case("bearer")
            .then_some(token.trim())
    }

    fn service_key(&self) -> Option<&str> {
        self.service_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum CredentialKind {
    CallbackToken,
    ServiceKey { key: ServiceApiKeyUuid },
}

/// An admitted service caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedService {
    pub tenant: TenantUuid,
    pub correlation: Option<CorrelationUuid>,
    pub kind: CredentialKind,
    pub scopes: ServiceScopes,
}

impl AuthenticatedService {
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] when the credential lacks `scope`.
    pub fn require_scope(&self, scope: &str) -> Result<(), AuthError> {
        if self.scopes.allows(scope) {
            Ok(())
        } else {
            Err(AuthError::Forbidden(scope.to_string()))
        }
    }

    /// The context every unit of work for this request is bound to. Service
    /// keys act as themselves; callbacks carry the event's correlation.
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        let mut context = RequestContext::for_tenant(self.tenant);

        if let CredentialKind::ServiceKey { key } = self.kind {
            context = context.with_actor(ActorUuid::from_uuid(key.into_uuid()));
        }

        if let Some(correlation) = self.correlation {
            context = context.with_correlation(correlation);
        }

        context
    }
}

#[automock]
#[async_trait]
pub trait ServiceAuthenticator: Send + Sync {
    async fn authenticate(
        &self,
        credentials: &ServiceCredentials,
    ) -> Result<AuthenticatedService, AuthError>;
}

#[derive(Clone)]
pub struct CredentialAuthenticator {
    callbacks: CallbackTokenService,
    keys: Arc<dyn ServiceKeyRepository>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CredentialAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialAuthenticator")
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}

impl CredentialAuthenticator {
    #[must_use]
    pub fn new(
        callbacks: CallbackTokenService,
        keys: Arc<dyn ServiceKeyRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            callbacks,
            keys,
            clock,
        }
    }

    fn authenticate_callback(&self, token: &str) -> Result<AuthenticatedService, AuthError> {
        let claims = self
            .callbacks
            .validate(token)
            .ok_or(AuthError::Unauthenticated(AuthFailure::InvalidCallbackToken))?;

        Ok(AuthenticatedService {
            tenant: claims.tenant,
            correlation: Some(claims.correlation),
            kind: CredentialKind::CallbackToken,
            scopes: ServiceScopes::Full,
        })
    }

    async fn authenticate_key(
        &self,
        raw_key: &str,
        origin: Option<String>,
    ) -> Result<AuthenticatedService, AuthError> {
        let now = self.clock.now();

        let key = self
            .keys
            .find_usable_by_hash(&hash_service_key(raw_key), now)
            .await
            .map_err(AuthError::Store)?
            .ok_or(AuthError::Unauthenticated(AuthFailure::UnknownServiceKey))?;

        let tenant = key
            .tenant_uuid
            .ok_or(AuthError::Unauthenticated(AuthFailure::UnknownServiceKey))?;

        self.touch_in_background(key.uuid(), now, origin);

        Ok(AuthenticatedService {
            tenant,
            correlation: None,
            kind: CredentialKind::ServiceKey { key: key.uuid() },
            scopes: ServiceScopes::from_key(key.scopes.as_deref()),
        })
    }

    /// Best effort. Never awaited by the request and never fails it.
    fn touch_in_background(&self, key: ServiceApiKeyUuid, at: Timestamp, origin: Option<String>) {
        let keys = Arc::clone(&self.keys);

        tokio::spawn(async move {
            match tokio::time::timeout(
                LAST_USED_TOUCH_TIMEOUT,
                keys.touch_last_used(key, at, origin),
            )
            .await
            {
                Ok(Ok(())) => debug!(key_uuid = %key, "service key last use recorded"),
                Ok(Err(error)) => {
                    warn!(key_uuid = %key, error = %error, "failed to record service key use");
                }
                Err(_elapsed) => {
                    warn!(key_uuid = %key, "timed out recording service key use");
                }
            }
        });
    }
}

#[async_trait]
impl ServiceAuthenticator for CredentialAuthenticator {
    async fn authenticate(
        &self,
        credentials: &ServiceCredentials,
    ) -> Result<AuthenticatedService, AuthError> {
        if let Some(token) = credentials.bearer_token() {
            return self.authenticate_callback(token);
        }

        if let Some(raw_key) = credentials.service_key() {
            return self
                .authenticate_key(raw_key, credentials.origin.clone())
                .await;
        }

        Err(AuthError::Unauthenticated(AuthFailure::MissingCredentials))
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use mockall::predicate::eq;
    use testresult::TestResult;
    use tokio::sync::oneshot;

    use crate::{
        auth::{
            MockServiceKeyRepository, NewServiceApiKey, ServiceKeysService,
            UowServiceKeyRepository, UowServiceKeysService, models::ServiceApiKeyRecord,
        },
        clock::ManualClock,
        entity::EntityMeta,
        persistence::PersistenceError,
        test::{TestContext, helpers::signing_config},
    };

    use super::*;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Timestamp::from_second(1_800_000_000).unwrap_or(Timestamp::UNIX_EPOCH),
        ))
    }

    fn authenticator(keys: MockServiceKeyRepository, clock: Arc<ManualClock>) -> CredentialAuthenticator {
        CredentialAuthenticator::new(
            CallbackTokenService::new(&signing_config(), clock.clone()),
            Arc::new(keys),
            clock,
        )
    }

    fn key_record(tenant: TenantUuid, scopes: Option<Vec<String>>) -> ServiceApiKeyRecord {
        ServiceApiKeyRecord {
            meta: EntityMeta::with_uuid(uuid::Uuid::now_v7()),
            tenant_uuid: Some(tenant),
            key_hash: hash_service_key("wb_sk_test"),
            name: "automation".to_string(),
            description: None,
            active: true,
            expires_at: None,
            scopes,
            last_used_at: None,
            last_used_from: None,
        }
    }

    fn bearer(token: &str) -> ServiceCredentials {
        ServiceCredentials {
            authorization: Some(format!("Bearer {token}")),
            ..ServiceCredentials::default()
        }
    }

    fn service_key(key: &str) -> ServiceCredentials {
        ServiceCredentials {
            service_key: Some(key.to_string()),
            origin: Some("10.1.2.3".to_string()),
            ..ServiceCredentials::default()
        }
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let credentials = ServiceCredentials {
            authorization: Some("bearer abc".to_string()),
            ..ServiceCredentials::default()
        };

        assert_eq!(credentials.bearer_token(), Some("abc"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let credentials = ServiceCredentials {
            authorization: Some("Basic dXNlcjpwYXNz".to_string()),
            ..ServiceCredentials::default()
        };

        assert_eq!(credentials.bearer_token(), None);
    }

    #[tokio::test]
    async fn callback_tokens_admit_their_tenant_and_correlation() -> TestResult {
        let clock = clock();
        let mut keys = MockServiceKeyRepository::new();
        keys.expect_find_usable_by_hash().never();

        let auth = authenticator(keys, clock.clone());
        let tenant = TenantUuid::new();
        let correlation = CorrelationUuid::new();

        let token = CallbackTokenService::new(&signing_config(), clock).issue(tenant, correlation)?;

        let service = auth.authenticate(&bearer(&token)).await?;

        assert_eq!(service.tenant, tenant);
        assert_eq!(service.correlation, Some(correlation));
        assert_eq!(service.kind, CredentialKind::CallbackToken);
        assert_eq!(service.request_context().correlation(), Some(correlation));
        assert_eq!(service.request_context().tenant(), Some(tenant));

        Ok(())
    }

    #[tokio::test]
    async fn invalid_bearer_tokens_do_not_fall_through_to_service_keys() {
        let mut keys = MockServiceKeyRepository::new();
        keys.expect_find_usable_by_hash().never();

        let auth = authenticator(keys, clock());

        let credentials = ServiceCredentials {
            authorization: Some("Bearer not-a-token".to_string()),
            service_key: Some("wb_sk_test".to_string()),
            origin: None,
        };

        let result = auth.authenticate(&credentials).await;

        assert!(
            matches!(
                result,
                Err(AuthError::Unauthenticated(AuthFailure::InvalidCallbackToken))
            ),
            "expected InvalidCallbackToken, got {result:?}"
        );
    }

    #[tokio::test]
    async fn expired_callback_tokens_are_refused() -> TestResult {
        let clock = clock();
        let mut keys = MockServiceKeyRepository::new();
        keys.expect_find_usable_by_hash().never();

        let auth = authenticator(keys, clock.clone());
        let token = CallbackTokenService::new(&signing_config(), clock.clone())
            .issue(TenantUuid::new(), CorrelationUuid::new())?;

        clock.advance(SignedDuration::from_mins(16));

        let result = auth.authenticate(&bearer(&token)).await;

        assert!(
            matches!(result, Err(AuthError::Unauthenticated(_))),
            "expected Unauthenticated, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn service_keys_admit_their_tenant_and_touch_last_use() -> TestResult {
        let clock = clock();
        let tenant = TenantUuid::new();
        let record = key_record(tenant, Some(vec!["fleet:read".to_string()]));
        let key_uuid = record.uuid();

        let (touched_tx, touched_rx) = oneshot::channel();
        let touched_tx = std::sync::Mutex::new(Some(touched_tx));

        let mut keys = MockServiceKeyRepository::new();

        keys.expect_find_usable_by_hash()
            .withf(|hash, _| hash == hash_service_key("wb_sk_test"))
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));

        keys.expect_touch_last_used()
            .with(
                eq(key_uuid),
                mockall::predicate::always(),
                eq(Some("10.1.2.3".to_string())),
            )
            .times(1)
            .returning(move |_, _, _| {
                if let Ok(mut sender) = touched_tx.lock()
                    && let Some(sender) = sender.take()
                {
                    let _sent = sender.send(());
                }

                Ok(())
            });

        let auth = authenticator(keys, clock);

        let service = auth.authenticate(&service_key("wb_sk_test")).await?;

        assert_eq!(service.tenant, tenant);
        assert_eq!(service.correlation, None);
        assert_eq!(service.kind, CredentialKind::ServiceKey { key: key_uuid });
        assert!(service.require_scope("fleet:read").is_ok());
        assert!(matches!(
            service.require_scope("fleet:write"),
            Err(AuthError::Forbidden(_))
        ));

        touched_rx.await?;

        Ok(())
    }

    #[tokio::test]
    async fn unknown_service_keys_are_refused() {
        let mut keys = MockServiceKeyRepository::new();

        keys.expect_find_usable_by_hash()
            .times(1)
            .returning(|_, _| Ok(None));
        keys.expect_touch_last_used().never();

        let auth = authenticator(keys, clock());

        let result = auth.authenticate(&service_key("wb_sk_wrong")).await;

        assert!(
            matches!(
                result,
                Err(AuthError::Unauthenticated(AuthFailure::UnknownServiceKey))
            ),
            "expected UnknownServiceKey, got {result:?}"
        );
    }

    #[tokio::test]
    async fn failed_last_use_updates_do_not_fail_the_request() -> TestResult {
        let tenant = TenantUuid::new();
        let record = key_record(tenant, None);

        let mut keys = MockServiceKeyRepository::new();

        keys.expect_find_usable_by_hash()
            .returning(move |_, _| Ok(Some(record.clone())));
        keys.expect_touch_last_used()
            .returning(|_, _, _| Err(PersistenceError::NotFound));

        let auth = authenticator(keys, clock());

        let service = auth.authenticate(&service_key("wb_sk_test")).await?;

        assert_eq!(service.tenant, tenant);
        assert_eq!(service.scopes, ServiceScopes::Full);

        Ok(())
    }

    #[tokio::test]
    async fn store_failures_are_not_authentication_failures() {
        let mut keys = MockServiceKeyRepository::new();

        keys.expect_find_usable_by_hash()
            .returning(|_, _| Err(PersistenceError::TransactionAlreadyOpen));

        let auth = authenticator(keys, clock());

        let result = auth.authenticate(&service_key("wb_sk_test")).await;

        assert!(
            matches!(result, Err(AuthError::Store(_))),
            "expected Store, got {result:?}"
        );
    }

    #[tokio::test]
    async fn missing_credentials_are_refused() {
        let mut keys = MockServiceKeyRepository::new();
        keys.expect_find_usable_by_hash().never();

        let auth = authenticator(keys, clock());

        let result = auth
            .authenticate(&ServiceCredentials {
                service_key: Some("   ".to_string()),
                ..ServiceCredentials::default()
            })
            .await;

        assert!(
            matches!(
                result,
                Err(AuthError::Unauthenticated(AuthFailure::MissingCredentials))
            ),
            "expected MissingCredentials, got {result:?}"
        );
    }

    #[tokio::test]
    async fn issued_keys_authenticate_end_to_end() -> TestResult {
        let ctx = TestContext::new().await;

        let issued = UowServiceKeysService::new(ctx.units.clone())
            .issue(
                ctx.tenant_a,
                NewServiceApiKey {
                    name: "automation".to_string(),
                    description: None,
                    expires_at: None,
                    scopes: None,
                },
            )
            .await?;

        let auth = CredentialAuthenticator::new(
            CallbackTokenService::new(&signing_config(), ctx.clock.clone()),
            Arc::new(UowServiceKeyRepository::new(ctx.units.clone())),
            ctx.clock.clone(),
        );

        let service = auth.authenticate(&service_key(issued.key.as_str())).await?;

        assert_eq!(service.tenant, ctx.tenant_a);

        let wrong = auth.authenticate(&service_key("wb_sk_0000")).await;

        assert!(matches!(wrong, Err(AuthError::Unauthenticated(_))));

        Ok(())
    }
}
