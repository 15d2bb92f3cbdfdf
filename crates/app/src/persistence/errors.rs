//! Unit of work and repository errors.

use thiserror::Error;

use crate::{domain::tenants::TenantUuid, store::StoreError, tenancy::SystemOperation};

/// A write or read that would cross a tenant boundary, refused before it
/// reached the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IsolationViolation {
    #[error("{kind} rows must belong to a tenant")]
    MissingTenant { kind: &'static str },

    #[error("{kind} row belongs to a different tenant than the current scope")]
    TenantMismatch { kind: &'static str },

    #[error("{kind} row cannot move between tenants")]
    TenantChanged { kind: &'static str },

    #[error("tenant {0} does not exist")]
    UnknownTenant(TenantUuid),

    #[error("tenant {0} is not active")]
    InactiveTenant(TenantUuid),

    #[error("{operation} may not modify {kind} rows")]
    MutationNotPermitted {
        operation: SystemOperation,
        kind: &'static str,
    },

    #[error("{operation} may not create {kind} rows")]
    InsertNotPermitted {
        operation: SystemOperation,
        kind: &'static str,
    },

    #[error("{kind} rows are shared by all tenants and cannot be changed from a tenant scope")]
    GlobalRowInTenantScope { kind: &'static str },

    #[error("unfiltered reads are not permitted in this scope")]
    UnfilteredReadNotPermitted,

    #[error("permanent deletes are not permitted in this scope")]
    HardDeleteNotPermitted,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("entity type `{0}` is not registered")]
    Unregistered(&'static str),

    #[error("entity not found")]
    NotFound,

    #[error("entity already exists")]
    AlreadyExists,

    #[error("entity was changed since it was loaded")]
    Stale,

    #[error(transparent)]
    Isolation(#[from] IsolationViolation),

    #[error("a transaction is already open")]
    TransactionAlreadyOpen,

    #[error("no transaction is open")]
    NoOpenTransaction,

    #[error("entity could not be serialized")]
    Serialization(#[source] serde_json::Error),

    #[error("storage error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for PersistenceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { .. } => Self::AlreadyExists,
            StoreError::Missing { .. } => Self::NotFound,
            StoreError::Stale { .. } => Self::Stale,
            StoreError::TransactionOpen => Self::TransactionAlreadyOpen,
            StoreError::NoTransaction => Self::NoOpenTransaction,
            StoreError::Unavailable(_) | StoreError::Sql(_) => Self::Store(error),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error)
    }
}
