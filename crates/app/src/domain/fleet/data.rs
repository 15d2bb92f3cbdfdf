//! Fleet Data

use crate::domain::fleet::records::{DriverUuid, FleetLogReason, TruckType, TruckUuid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTruck {
    pub plate: String,
    pub model: String,
    pub truck_type: TruckType,
    pub max_capacity_kg: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDriver {
    pub full_name: String,
    pub license_number: String,
    pub default_truck: Option<TruckUuid>,
}

/// Move a driver onto another truck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverReassignment {
    pub driver: DriverUuid,
    pub truck: TruckUuid,
    pub reason: FleetLogReason,
}
