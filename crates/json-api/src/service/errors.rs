//! Fleet Errors

use salvo::http::StatusError;
use tracing::{error, warn};

use waybill_app::{domain::fleet::FleetServiceError, persistence::PersistenceError};

pub(crate) fn into_status_error(error: FleetServiceError) -> StatusError {
    match error {
        FleetServiceError::DriverNotFound => StatusError::not_found().brief("Driver not found"),
        FleetServiceError::TruckNotFound => StatusError::not_found().brief("Truck not found"),
        FleetServiceError::TruckInactive => {
            StatusError::conflict().brief("Truck is not active")
        }
        FleetServiceError::AlreadyAssigned => {
            StatusError::conflict().brief("Driver is already assigned to this truck")
        }
        FleetServiceError::DuplicatePlate | FleetServiceError::AlreadyExists => {
            StatusError::conflict().brief("Fleet record already exists")
        }
        FleetServiceError::Isolation(violation) => {
            warn!("fleet request crossed a tenant boundary: {violation}");

            StatusError::forbidden()
        }
        FleetServiceError::Persistence(PersistenceError::Stale) => {
            StatusError::conflict().brief("Fleet record changed concurrently")
        }
        FleetServiceError::Persistence(source) => {
            error!("fleet request failed: {source}");

            StatusError::internal_server_error()
        }
    }
}
