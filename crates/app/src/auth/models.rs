//! Service key records and the shapes handed to administrators.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    auth::keys::ServiceKeySecret,
    domain::tenants::TenantUuid,
    entity::{Entity, EntityMeta, impl_entity},
    persistence::{PersistenceError, Repository, UnitOfWork},
    uuids::TypedUuid,
};

pub type ServiceApiKeyUuid = TypedUuid<ServiceApiKeyRecord>;

/// A persistent service credential. Holds the key's hash, never the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceApiKeyRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    pub tenant_uuid: Option<TenantUuid>,

    /// SHA-256 hex digest of the raw key.
    pub key_hash: String,

    pub name: String,

    pub description: Option<String>,

    pub active: bool,

    pub expires_at: Option<Timestamp>,

    /// `None` grants full service access.
    pub scopes: Option<Vec<String>>,

    pub last_used_at: Option<Timestamp>,

    pub last_used_from: Option<String>,
}

impl_entity!(
    ServiceApiKeyRecord,
    kind = "service_api_keys",
    tenant_scoped,
    search = ["name", "description"]
);

impl ServiceApiKeyRecord {
    /// Active, not deleted and not expired at `now`.
    #[must_use]
    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        self.active
            && !self.meta.deleted
            && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

impl UnitOfWork {
    /// # Errors
    ///
    /// Returns an error if service keys are not registered.
    pub fn service_api_keys(
        &mut self,
    ) -> Result<Repository<'_, ServiceApiKeyRecord>, PersistenceError> {
        self.repository()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServiceApiKey {
    pub name: String,
    pub description: Option<String>,
    pub expires_at: Option<Timestamp>,
    pub scopes: Option<Vec<String>>,
}

/// Everything about a key an administrator may see after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceApiKeyMetadata {
    pub uuid: ServiceApiKeyUuid,
    pub tenant_uuid: Option<TenantUuid>,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub expires_at: Option<Timestamp>,
    pub scopes: Option<Vec<String>>,
    pub last_used_at: Option<Timestamp>,
    pub last_used_from: Option<String>,
    pub created_at: Timestamp,
}

impl From<&ServiceApiKeyRecord> for ServiceApiKeyMetadata {
    fn from(record: &ServiceApiKeyRecord) -> Self {
        Self {
            uuid: record.uuid(),
            tenant_uuid: record.tenant_uuid,
            name: record.name.clone(),
            description: record.description.clone(),
            active: record.active,
            expires_at: record.expires_at,
            scopes: record.scopes.clone(),
            last_used_at: record.last_used_at,
            last_used_from: record.last_used_from.clone(),
            created_at: record.meta.created_at,
        }
    }
}

/// A freshly issued key. The raw key is not recoverable afterwards.
#[derive(Debug)]
pub struct IssuedServiceKey {
    pub key: ServiceKeySecret,
    pub metadata: ServiceApiKeyMetadata,
}
