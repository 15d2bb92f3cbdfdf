//! Tenants service errors.

use thiserror::Error;

use crate::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum TenantsServiceError {
    #[error("tenant already exists")]
    AlreadyExists,

    #[error("tenant not found")]
    NotFound,

    #[error("company name must not be empty")]
    MissingCompanyName,

    #[error("storage error")]
    Persistence(#[source] PersistenceError),
}

impl From<PersistenceError> for TenantsServiceError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::AlreadyExists => Self::AlreadyExists,
            PersistenceError::NotFound => Self::NotFound,
            error => Self::Persistence(error),
        }
    }
}
