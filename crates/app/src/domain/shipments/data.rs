//! Shipment Data

use crate::domain::{
    fleet::{DriverUuid, TruckUuid},
    shipments::records::ShipmentStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub tracking_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentStatusUpdate {
    pub status: ShipmentStatus,

    /// Recorded when moving into [`ShipmentStatus::Exception`].
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipmentAssignment {
    pub truck: Option<TruckUuid>,
    pub driver: Option<DriverUuid>,
}
