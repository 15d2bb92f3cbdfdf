//! Service Context Handler

use salvo::{oapi::ToSchema, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waybill_app::auth::{AuthenticatedService, CredentialKind, ServiceScopes};

use crate::extensions::*;

/// Who the caller was admitted as.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ServiceContextResponse {
    /// Tenant every request acts for
    pub tenant_id: Uuid,

    /// Correlation carried by a callback token
    pub correlation_id: Option<Uuid>,

    /// `callback_token` or `service_key`
    pub credential_type: String,

    /// The key's id, for service-key callers
    pub service_key_id: Option<Uuid>,

    /// Granted scopes; absent means full service access
    pub scopes: Option<Vec<String>>,
}

impl From<&AuthenticatedService> for ServiceContextResponse {
    fn from(service: &AuthenticatedService) -> Self {
        let (credential_type, service_key_id) = match &service.kind {
            CredentialKind::CallbackToken => ("callback_token", None),
            CredentialKind::ServiceKey { key } => ("service_key", Some(key.into_uuid())),
        };

        Self {
            tenant_id: service.tenant.into_uuid(),
            correlation_id: service.correlation.map(|correlation| correlation.into_uuid()),
            credential_type: credential_type.to_string(),
            service_key_id,
            scopes: match &service.scopes {
                ServiceScopes::Full => None,
                ServiceScopes::Limited(scopes) => Some(scopes.clone()),
            },
        }
    }
}

/// Service Context Handler
///
/// Echoes the tenant and credential the caller authenticated with.
#[endpoint(
    tags("service"),
    summary = "Describe the authenticated caller",
    security(("bearer_auth" = []), ("service_key" = []))
)]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<ServiceContextResponse>, StatusError> {
    let service = depot.authenticated_service_or_401()?;

    Ok(Json(service.into()))
}

#[cfg(test)]
mod tests {
    use salvo::test::{ResponseExt, TestClient};
    use testresult::TestResult;
    use waybill_app::{
        auth::ServiceApiKeyUuid, domain::tenants::TenantUuid, tenancy::CorrelationUuid,
    };

    use crate::test_helpers::{fleet_service, strict_fleet_mock};

    use super::*;

    fn make_service(service: AuthenticatedService) -> Service {
        fleet_service(
            strict_fleet_mock(),
            service,
            Router::with_path("service/context").get(handler),
        )
    }

    #[tokio::test]
    async fn callback_callers_see_their_correlation() -> TestResult {
        let tenant = TenantUuid::new();
        let correlation = CorrelationUuid::new();

        let response: ServiceContextResponse =
            TestClient::get("http://example.com/service/context")
                .send(&make_service(AuthenticatedService {
                    tenant,
                    correlation: Some(correlation),
                    kind: CredentialKind::CallbackToken,
                    scopes: ServiceScopes::Full,
                }))
                .await
                .take_json()
                .await?;

        assert_eq!(response.tenant_id, tenant.into_uuid());
        assert_eq!(response.correlation_id, Some(correlation.into_uuid()));
        assert_eq!(response.credential_type, "callback_token");
        assert_eq!(response.scopes, None);

        Ok(())
    }

    #[tokio::test]
    async fn service_key_callers_see_key_and_scopes() -> TestResult {
        let key = ServiceApiKeyUuid::new();

        let response: ServiceContextResponse =
            TestClient::get("http://example.com/service/context")
                .send(&make_service(AuthenticatedService {
                    tenant: TenantUuid::new(),
                    correlation: None,
                    kind: CredentialKind::ServiceKey { key },
                    scopes: ServiceScopes::Limited(vec!["fleet:read".to_string()]),
                }))
                .await
                .take_json()
                .await?;

        assert_eq!(response.credential_type, "service_key");
        assert_eq!(response.service_key_id, Some(key.into_uuid()));
        assert_eq!(response.scopes, Some(vec!["fleet:read".to_string()]));

        Ok(())
    }
}
