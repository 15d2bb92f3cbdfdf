//! Shipments service errors.

use thiserror::Error;

use crate::{
    domain::shipments::records::ShipmentStatus,
    persistence::{IsolationViolation, PersistenceError},
};

#[derive(Debug, Error)]
pub enum ShipmentsServiceError {
    #[error("shipment not found")]
    NotFound,

    #[error("truck not found")]
    TruckNotFound,

    #[error("driver not found")]
    DriverNotFound,

    #[error("shipment must have a tracking number")]
    MissingTrackingNumber,

    #[error("a shipment with this tracking number already exists")]
    DuplicateTrackingNumber,

    #[error("shipment is {0:?} and can no longer change")]
    Finalized(ShipmentStatus),

    #[error(transparent)]
    Isolation(IsolationViolation),

    #[error("storage error")]
    Persistence(#[source] PersistenceError),
}

impl From<PersistenceError> for ShipmentsServiceError {
    fn from(error: PersistenceError) -> Self {
        match error {
            PersistenceError::NotFound => Self::NotFound,
            PersistenceError::AlreadyExists => Self::DuplicateTrackingNumber,
            PersistenceError::Isolation(violation) => Self::Isolation(violation),
            error => Self::Persistence(error),
        }
    }
}
