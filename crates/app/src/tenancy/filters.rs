//! Standing read filters, registered once per entity type.

use std::any::TypeId;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::{
    entity::Entity,
    store::{Row, RowFilter},
};

use super::TenantScope;

/// The predicate every read of a registered type is subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandingFilter {
    /// Hide soft-deleted rows.
    NotDeleted,

    /// Hide soft-deleted rows and, when a tenant is pinned, every other
    /// tenant's rows.
    NotDeletedWithinTenant,
}

impl StandingFilter {
    /// The column predicates to push down to the store.
    #[must_use]
    pub fn row_filter(self, scope: &TenantScope) -> RowFilter {
        match self {
            Self::NotDeleted => RowFilter::default(),
            Self::NotDeletedWithinTenant => RowFilter {
                tenant: scope.pinned_tenant(),
                ..RowFilter::default()
            },
        }
    }

    /// Whether `row` passes this filter under `scope`.
    #[must_use]
    pub fn admits(self, row: &Row, scope: &TenantScope) -> bool {
        self.row_filter(scope).matches(row)
    }
}

/// What the registry knows about one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    pub kind: &'static str,
    pub filter: StandingFilter,
    pub search_fields: &'static [&'static str],
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity kind `{0}` is registered twice")]
    DuplicateKind(&'static str),
}

#[derive(Debug, Default)]
pub struct FilterRegistryBuilder {
    registrations: Vec<(TypeId, Registration)>,
}

impl FilterRegistryBuilder {
    /// Register `E`, deriving its filter from whether it is tenant scoped.
    #[must_use]
    pub fn register<E: Entity>(mut self) -> Self {
        let filter = if E::TENANT_SCOPED {
            StandingFilter::NotDeletedWithinTenant
        } else {
            StandingFilter::NotDeleted
        };

        self.registrations.push((
            TypeId::of::<E>(),
            Registration {
                kind: E::KIND,
                filter,
                search_fields: E::SEARCH_FIELDS,
            },
        ));

        self
    }

    /// Freeze the registrations.
    ///
    /// # Errors
    ///
    /// Returns an error if two types share a storage kind.
    pub fn build(self) -> Result<FilterRegistry, RegistryError> {
        let mut by_type = FxHashMap::default();
        let mut kinds = FxHashMap::default();

        for (type_id, registration) in self.registrations {
            if kinds.insert(registration.kind, type_id).is_some_and(|existing| existing != type_id) {
                return Err(RegistryError::DuplicateKind(registration.kind));
            }

            by_type.insert(type_id, registration);
        }

        Ok(FilterRegistry { by_type })
    }
}

/// Immutable table of standing filters, shared by every unit of work.
///
/// Types that were never registered have no filter, and the unit of work
/// refuses to read or write them.
#[derive(Debug)]
pub struct FilterRegistry {
    by_type: FxHashMap<TypeId, Registration>,
}

impl FilterRegistry {
    #[must_use]
    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    #[must_use]
    pub fn registration<E: Entity>(&self) -> Option<Registration> {
        self.by_type.get(&TypeId::of::<E>()).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
