//! Persistable entities and their audit metadata.

use std::fmt::Debug;

use jiff::Timestamp;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{domain::tenants::TenantUuid, tenancy::ActorUuid, uuids::TypedUuid};

/// Identity and audit fields shared by every entity.
///
/// Stamped by the unit of work at commit; callers should treat everything but
/// `deleted` as read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub uuid: Uuid,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub deleted: bool,
    pub deleted_at: Option<Timestamp>,
    pub created_by: Option<ActorUuid>,
    pub updated_by: Option<ActorUuid>,
    /// Bumped on every committed modification. Updates staged from an older
    /// version are refused as stale.
    #[serde(default)]
    pub version: i64,
}

impl EntityMeta {
    /// Metadata for an entity that has not been persisted yet. The nil uuid is
    /// replaced with a generated one on insert.
    #[must_use]
    pub const fn unsaved() -> Self {
        Self {
            uuid: Uuid::nil(),
            created_at: Timestamp::UNIX_EPOCH,
            updated_at: None,
            deleted: false,
            deleted_at: None,
            created_by: None,
            updated_by: None,
            version: 0,
        }
    }

    #[must_use]
    pub const fn with_uuid(uuid: Uuid) -> Self {
        let mut meta = Self::unsaved();
        meta.uuid = uuid;
        meta
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::unsaved()
    }
}

/// A type the unit of work can persist.
///
/// Entities are stored as documents keyed by [`Entity::KIND`]; the metadata is
/// expected to be flattened into the document so audit fields sort and search
/// like any other field.
pub trait Entity: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable storage discriminator.
    const KIND: &'static str;

    /// Whether rows of this type belong to exactly one tenant.
    const TENANT_SCOPED: bool = false;

    /// Top-level document fields matched by free-text search.
    const SEARCH_FIELDS: &'static [&'static str] = &[];

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn tenant_uuid(&self) -> Option<TenantUuid> {
        None
    }

    fn assign_tenant(&mut self, _tenant: TenantUuid) {}

    fn uuid(&self) -> TypedUuid<Self> {
        TypedUuid::from_uuid(self.meta().uuid)
    }
}

/// Entities that carry a tenant reference and get the tenant-aware repository
/// operations.
pub trait TenantScoped: Entity {}

/// Implement [`Entity`] for a struct with `meta: EntityMeta` and, for tenant
/// scoped types, `tenant_uuid: Option<TenantUuid>` fields.
macro_rules! impl_entity {
    ($ty:ty, kind = $kind:literal, search = [$($field:literal),* $(,)?]) => {
        impl $crate::entity::Entity for $ty {
            const KIND: &'static str = $kind;
            const SEARCH_FIELDS: &'static [&'static str] = &[$($field),*];

            fn meta(&self) -> &$crate::entity::EntityMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::entity::EntityMeta {
                &mut self.meta
            }
        }
    };
    ($ty:ty, kind = $kind:literal, tenant_scoped, search = [$($field:literal),* $(,)?]) => {
        impl $crate::entity::Entity for $ty {
            const KIND: &'static str = $kind;
            const TENANT_SCOPED: bool = true;
            const SEARCH_FIELDS: &'static [&'static str] = &[$($field),*];

            fn meta(&self) -> &$crate::entity::EntityMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::entity::EntityMeta {
                &mut self.meta
            }

            fn tenant_uuid(&self) -> Option<$crate::domain::tenants::TenantUuid> {
                self.tenant_uuid
            }

            fn assign_tenant(&mut self, tenant: $crate::domain::tenants::TenantUuid) {
                self.tenant_uuid = Some(tenant);
            }
        }

        impl $crate::entity::TenantScoped for $ty {}
    };
}

pub(crate) use impl_entity;
