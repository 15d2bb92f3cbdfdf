//! Ambient tenant scope carried by every unit of work.

use std::fmt;

use crate::{
    auth::ServiceApiKeyRecord, domain::tenants::TenantUuid, entity::Entity, uuids::TypedUuid,
};

/// Marker for identifiers of the person or service that caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor;

/// Marker for identifiers that tie one logical operation together across systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlation;

pub type ActorUuid = TypedUuid<Actor>;
pub type CorrelationUuid = TypedUuid<Correlation>;

/// Operations allowed to run without a pinned tenant.
///
/// Anything not listed here must run pinned to a single tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemOperation {
    /// Creating tenants and seeding their first rows.
    TenantProvisioning,

    /// Resolving and touching service keys before the caller's tenant is known.
    ServiceKeyMaintenance,

    /// Read-only reporting across all tenants.
    CrossTenantReport,

    /// Operator maintenance: unfiltered views and permanent removal.
    Maintenance,
}

impl SystemOperation {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::TenantProvisioning => "tenant_provisioning",
            Self::ServiceKeyMaintenance => "service_key_maintenance",
            Self::CrossTenantReport => "cross_tenant_report",
            Self::Maintenance => "maintenance",
        }
    }

    /// Whether rows of `kind` may be written under this operation.
    #[must_use]
    pub fn permits_mutation_of(self, kind: &str) -> bool {
        match self {
            Self::TenantProvisioning | Self::Maintenance => true,
            Self::ServiceKeyMaintenance => kind == ServiceApiKeyRecord::KIND,
            Self::CrossTenantReport => false,
        }
    }

    /// Whether new rows may be created. Key maintenance only edits existing
    /// keys.
    #[must_use]
    pub const fn permits_inserts(self) -> bool {
        matches!(self, Self::TenantProvisioning | Self::Maintenance)
    }

    /// Whether the standing filters may be bypassed for reads.
    #[must_use]
    pub const fn permits_unfiltered_reads(self) -> bool {
        matches!(self, Self::CrossTenantReport | Self::Maintenance)
    }

    #[must_use]
    pub const fn permits_hard_delete(self) -> bool {
        matches!(self, Self::Maintenance)
    }
}

impl fmt::Display for SystemOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The tenant boundary a unit of work operates within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    /// Every read and write is confined to this tenant.
    Pinned(TenantUuid),

    /// No tenant is pinned; only the named operation may proceed.
    System(SystemOperation),
}

impl TenantScope {
    #[must_use]
    pub const fn pinned_tenant(&self) -> Option<TenantUuid> {
        match self {
            Self::Pinned(tenant) => Some(*tenant),
            Self::System(_) => None,
        }
    }

    #[must_use]
    pub const fn system_operation(&self) -> Option<SystemOperation> {
        match self {
            Self::Pinned(_) => None,
            Self::System(operation) => Some(*operation),
        }
    }
}

/// Who is acting, on behalf of which tenant, as part of which correlated flow.
///
/// Built once at the request boundary and handed to each unit of work; never
/// read from a global.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    scope: TenantScope,
    actor: Option<ActorUuid>,
    correlation: Option<CorrelationUuid>,
}

impl RequestContext {
    #[must_use]
    pub const fn for_tenant(tenant: TenantUuid) -> Self {
        Self {
            scope: TenantScope::Pinned(tenant),
            actor: None,
            correlation: None,
        }
    }

    #[must_use]
    pub const fn system(operation: SystemOperation) -> Self {
        Self {
            scope: TenantScope::System(operation),
            actor: None,
            correlation: None,
        }
    }

    #[must_use]
    pub const fn with_actor(mut self, actor: ActorUuid) -> Self {
        self.actor = Some(actor);
        self
    }

    #[must_use]
    pub const fn with_correlation(mut self, correlation: CorrelationUuid) -> Self {
        self.correlation = Some(correlation);
        self
    }

    #[must_use]
    pub const fn scope(&self) -> TenantScope {
        self.scope
    }

    #[must_use]
    pub const fn tenant(&self) -> Option<TenantUuid> {
        self.scope.pinned_tenant()
    }

    #[must_use]
    pub const fn actor(&self) -> Option<ActorUuid> {
        self.actor
    }

    #[must_use]
    pub const fn correlation(&self) -> Option<CorrelationUuid> {
        self.correlation
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tenants::TenantRecord;

    use super::*;

    #[test]
    fn service_key_maintenance_only_touches_keys() {
        let operation = SystemOperation::ServiceKeyMaintenance;

        assert!(operation.permits_mutation_of(ServiceApiKeyRecord::KIND));
        assert!(!operation.permits_mutation_of("trucks"));
        assert!(!operation.permits_mutation_of(TenantRecord::KIND));
        assert!(!operation.permits_inserts());
        assert!(!operation.permits_unfiltered_reads());
    }

    #[test]
    fn reports_are_read_only() {
        let operation = SystemOperation::CrossTenantReport;

        assert!(operation.permits_unfiltered_reads());
        assert!(!operation.permits_mutation_of("trucks"));
        assert!(!operation.permits_inserts());
        assert!(!operation.permits_hard_delete());
    }

    #[test]
    fn only_maintenance_hard_deletes() {
        assert!(SystemOperation::Maintenance.permits_hard_delete());
        assert!(!SystemOperation::TenantProvisioning.permits_hard_delete());
    }

    #[test]
    fn pinned_context_exposes_tenant() {
        let tenant = TenantUuid::new();
        let actor = ActorUuid::new();
        let context = RequestContext::for_tenant(tenant).with_actor(actor);

        assert_eq!(context.tenant(), Some(tenant));
        assert_eq!(context.actor(), Some(actor));
        assert_eq!(context.correlation(), None);
        assert_eq!(
            RequestContext::system(SystemOperation::Maintenance).tenant(),
            None
        );
    }
}
