//! Service key administration.

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    auth::{
        errors::ServiceKeyError,
        keys::generate_service_key,
        models::{
            IssuedServiceKey, NewServiceApiKey, ServiceApiKeyMetadata, ServiceApiKeyRecord,
            ServiceApiKeyUuid,
        },
        scopes::is_well_formed,
    },
    domain::tenants::TenantUuid,
    entity::{Entity, EntityMeta},
    persistence::UnitOfWorkFactory,
    tenancy::RequestContext,
};

#[derive(Debug, Clone)]
pub struct UowServiceKeysService {
    units: UnitOfWorkFactory,
}

impl UowServiceKeysService {
    #[must_use]
    pub fn new(units: UnitOfWorkFactory) -> Self {
        Self { units }
    }
}

#[async_trait]
impl ServiceKeysService for UowServiceKeysService {
    async fn issue(
        &self,
        tenant: TenantUuid,
        key: NewServiceApiKey,
    ) -> Result<IssuedServiceKey, ServiceKeyError> {
        if key.name.trim().is_empty() {
            return Err(ServiceKeyError::MissingName);
        }

        if let Some(scope) = key
            .scopes
            .iter()
            .flatten()
            .find(|scope| !is_well_formed(scope))
        {
            return Err(ServiceKeyError::InvalidScope(scope.clone()));
        }

        let secret = generate_service_key();

        let mut uow = self.units.create(RequestContext::for_tenant(tenant)).await?;

        let record = uow.service_api_keys()?.insert(ServiceApiKeyRecord {
            meta: EntityMeta::unsaved(),
            tenant_uuid: None,
            key_hash: secret.hash(),
            name: key.name.trim().to_string(),
            description: key.description,
            active: true,
            expires_at: key.expires_at,
            scopes: key.scopes,
            last_used_at: None,
            last_used_from: None,
        })?;

        uow.save_changes().await?;

        let record = uow
            .service_api_keys()?
            .get(record.uuid())
            .await?
            .ok_or(ServiceKeyError::NotFound)?;

        info!(tenant_uuid = %tenant, key_uuid = %record.uuid(), "service key issued");

        Ok(IssuedServiceKey {
            key: secret,
            metadata: ServiceApiKeyMetadata::from(&record),
        })
    }

    async fn list(&self, tenant: TenantUuid) -> Result<Vec<ServiceApiKeyMetadata>, ServiceKeyError> {
        let mut uow = self.units.create(RequestContext::for_tenant(tenant)).await?;

        let keys = uow.service_api_keys()?.all_for_tenant(tenant).await?;

        Ok(keys.iter().map(ServiceApiKeyMetadata::from).collect())
    }

    async fn disable(
        &self,
        tenant: TenantUuid,
        key: ServiceApiKeyUuid,
    ) -> Result<(), ServiceKeyError> {
        let mut uow = self.units.create(RequestContext::for_tenant(tenant)).await?;

        let mut record = uow
            .service_api_keys()?
            .get(key)
            .await?
            .ok_or(ServiceKeyError::NotFound)?;

        record.active = false;

        uow.service_api_keys()?.update(record).await?;
        uow.save_changes().await?;

        info!(tenant_uuid = %tenant, key_uuid = %key, "service key disabled");

        Ok(())
    }
}

#[automock]
#[async_trait]
/// Issue and manage a tenant's service keys.
pub trait ServiceKeysService: Send + Sync {
    /// Creates a key and returns its raw secret. The secret is not stored.
    async fn issue(
        &self,
        tenant: TenantUuid,
        key: NewServiceApiKey,
    ) -> Result<IssuedServiceKey, ServiceKeyError>;

    /// Lists the tenant's keys without their hashes.
    async fn list(&self, tenant: TenantUuid) -> Result<Vec<ServiceApiKeyMetadata>, ServiceKeyError>;

    /// Deactivates a key. Disabled keys are never reactivated.
    async fn disable(&self, tenant: TenantUuid, key: ServiceApiKeyUuid)
    -> Result<(), ServiceKeyError>;
}
