//! Test Helpers

use crate::{
    auth::TokenSigningConfig,
    domain::fleet::{DriverRecord, DriverStatus, TruckRecord, TruckType},
    entity::EntityMeta,
};

/// An unsaved, active truck with no tenant.
pub(crate) fn make_truck(plate: &str) -> TruckRecord {
    TruckRecord {
        meta: EntityMeta::unsaved(),
        tenant_uuid: None,
        plate: plate.to_string(),
        model: "Scania R450".to_string(),
        truck_type: TruckType::Flatbed,
        max_capacity_kg: 24_000,
        active: true,
    }
}

/// An unsaved, available driver with no tenant and no truck.
pub(crate) fn make_driver(full_name: &str) -> DriverRecord {
    DriverRecord {
        meta: EntityMeta::unsaved(),
        tenant_uuid: None,
        full_name: full_name.to_string(),
        license_number: format!("DL-{}", full_name.len()),
        status: DriverStatus::Available,
        default_truck: None,
        current_truck: None,
    }
}

pub(crate) fn signing_config() -> TokenSigningConfig {
    TokenSigningConfig {
        secret: "test-signing-secret-with-enough-entropy".to_string(),
        issuer: "waybill".to_string(),
        callback_audience: "automation-callback".to_string(),
        session_audience: "waybill-client".to_string(),
    }
}
