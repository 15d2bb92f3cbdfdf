//! Fleet service errors.

use thiserror::Error;

use crate::persistence::{IsolationViolation, PersistenceError};

#[derive(Debug, Error)]
pub enum FleetServiceError {
    #[error("truck not found")]
    TruckNotFound,

    #[error("driver not found")]
    DriverNotFound,

    #[error("truck is not active")]
    TruckInactive,

    #[error("driver is already assigned to this truck")]
    AlreadyAssigned,

    #[error("a truck with this plate already exists")]
    DuplicatePlate,

    #[error("fleet record already exists")]
    AlreadyExists,

    #[error(transparent)]
    Isolation(IsolationViolation),

    #[error("storage error")]
    Persistence(#[source] PersistenceError),
}

impl From<PersistenceError> for FleetServiceError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::AlreadyExists => Self::AlreadyExists,
            PersistenceError::Isolation(violation) => Self::Isolation(violation),
            error => Self::Persistence(error),
        }
    }
}
