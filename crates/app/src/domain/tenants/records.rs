//! Tenant Records

use serde::{Deserialize, Serialize};

use crate::{
    entity::{EntityMeta, impl_entity},
    persistence::{PersistenceError, Repository, UnitOfWork},
    uuids::TypedUuid,
};

/// Tenant UUID
pub type TenantUuid = TypedUuid<TenantRecord>;

/// Tenant Record
///
/// The root of isolation. Shared by every tenant, so only system scopes may
/// create or change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    /// Registered company name.
    pub company_name: String,

    /// Operational contact address.
    pub contact_email: String,

    /// Inactive tenants keep their data but cannot gain new rows.
    pub active: bool,
}

impl TenantRecord {
    #[must_use]
    pub fn new(company_name: impl Into<String>, contact_email: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::unsaved(),
            company_name: company_name.into(),
            contact_email: contact_email.into(),
            active: true,
        }
    }
}

impl_entity!(TenantRecord, kind = "tenants", search = ["company_name", "contact_email"]);

impl UnitOfWork {
    /// # Errors
    ///
    /// Returns an error if tenants are not registered.
    pub fn tenants(&mut self) -> Result<Repository<'_, TenantRecord>, PersistenceError> {
        self.repository()
    }
}
