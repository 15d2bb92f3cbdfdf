//! Tenants service.

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    domain::tenants::{
        data::NewTenant,
        errors::TenantsServiceError,
        records::{TenantRecord, TenantUuid},
    },
    entity::{Entity, EntityMeta},
    persistence::{Page, PageRequest, UnitOfWorkFactory},
    tenancy::{RequestContext, SystemOperation},
};

#[derive(Debug, Clone)]
pub struct UowTenantsService {
    units: UnitOfWorkFactory,
}

impl UowTenantsService {
    #[must_use]
    pub fn new(units: UnitOfWorkFactory) -> Self {
        Self { units }
    }

    fn context() -> RequestContext {
        RequestContext::system(SystemOperation::TenantProvisioning)
    }
}

#[async_trait]
impl TenantsService for UowTenantsService {
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError> {
        if tenant.company_name.trim().is_empty() {
            return Err(TenantsServiceError::MissingCompanyName);
        }

        let mut uow = self.units.create(Self::context()).await?;

        let mut record = TenantRecord::new(tenant.company_name.trim(), tenant.contact_email);

        if let Some(uuid) = tenant.uuid {
            record.meta = EntityMeta::with_uuid(uuid.into_uuid());

            if uow.tenants()?.get(uuid).await?.is_some() {
                return Err(TenantsServiceError::AlreadyExists);
            }
        }

        let record = uow.tenants()?.insert(record)?;

        uow.save_changes().await?;

        let created = uow
            .tenants()?
            .get(record.uuid())
            .await?
            .ok_or(TenantsServiceError::NotFound)?;

        info!(tenant_uuid = %created.uuid(), "tenant created");

        Ok(created)
    }

    async fn list_tenants(
        &self,
        request: PageRequest,
    ) -> Result<Page<TenantRecord>, TenantsServiceError> {
        let mut uow = self.units.create(Self::context()).await?;

        Ok(uow.tenants()?.page(&request).await?)
    }

    async fn deactivate_tenant(&self, tenant: TenantUuid) -> Result<(), TenantsServiceError> {
        let mut uow = self.units.create(Self::context()).await?;

        let mut record = uow
            .tenants()?
            .get(tenant)
            .await?
            .ok_or(TenantsServiceError::NotFound)?;

        record.active = false;

        uow.tenants()?.update(record).await?;
        uow.save_changes().await?;

        info!(tenant_uuid = %tenant, "tenant deactivated");

        Ok(())
    }
}

#[automock]
#[async_trait]
/// Tenant provisioning. Always runs under the provisioning system scope.
pub trait TenantsService: Send + Sync {
    /// Creates a new, active tenant.
    async fn create_tenant(&self, tenant: NewTenant) -> Result<TenantRecord, TenantsServiceError>;

    /// Lists live tenants, newest first.
    async fn list_tenants(
        &self,
        request: PageRequest,
    ) -> Result<Page<TenantRecord>, TenantsServiceError>;

    /// Stops a tenant from gaining new rows. Existing rows stay readable.
    async fn deactivate_tenant(&self, tenant: TenantUuid) -> Result<(), TenantsServiceError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{clock::Clock, domain::fleet::TruckRecord, test::TestContext};

    use super::*;

    fn new_tenant(name: &str) -> NewTenant {
        NewTenant {
            uuid: None,
            company_name: name.to_string(),
            contact_email: "ops@example.test".to_string(),
        }
    }

    #[tokio::test]
    async fn create_tenant_stamps_identity_and_creation_time() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let tenant = svc.create_tenant(new_tenant("Acme Freight")).await?;

        assert!(!tenant.meta.uuid.is_nil());
        assert_eq!(tenant.meta.created_at, ctx.clock.now());
        assert_eq!(tenant.company_name, "Acme Freight");
        assert!(tenant.active);

        Ok(())
    }

    #[tokio::test]
    async fn create_tenant_with_explicit_uuid() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let uuid = TenantUuid::new();

        let tenant = svc
            .create_tenant(NewTenant {
                uuid: Some(uuid),
                ..new_tenant("Explicit")
            })
            .await?;

        assert_eq!(tenant.uuid(), uuid);

        Ok(())
    }

    #[tokio::test]
    async fn create_tenant_duplicate_uuid_returns_already_exists() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let result = svc
            .create_tenant(NewTenant {
                uuid: Some(ctx.tenant_a),
                ..new_tenant("Second")
            })
            .await;

        assert!(
            matches!(result, Err(TenantsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_tenant_rejects_blank_name() {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let result = svc.create_tenant(new_tenant("   ")).await;

        assert!(
            matches!(result, Err(TenantsServiceError::MissingCompanyName)),
            "expected MissingCompanyName, got {result:?}"
        );
    }

    #[tokio::test]
    async fn list_tenants_includes_provisioned_tenants() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let page = svc.list_tenants(PageRequest::default()).await?;

        assert_eq!(page.total_count, 2);

        Ok(())
    }

    #[tokio::test]
    async fn deactivated_tenants_cannot_gain_rows() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        svc.deactivate_tenant(ctx.tenant_a).await?;

        let mut uow = ctx.tenant_uow(ctx.tenant_a).await?;

        uow.repository::<TruckRecord>()?
            .insert(crate::test::helpers::make_truck("AB-123"))?;

        let result = uow.save_changes().await;

        assert!(result.is_err(), "insert for an inactive tenant should fail");

        Ok(())
    }

    #[tokio::test]
    async fn deactivate_unknown_tenant_returns_not_found() {
        let ctx = TestContext::new().await;
        let svc = UowTenantsService::new(ctx.units.clone());

        let result = svc.deactivate_tenant(TenantUuid::new()).await;

        assert!(
            matches!(result, Err(TenantsServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }
}
