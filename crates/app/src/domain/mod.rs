//! Waybill Domain Concerns

use crate::{
    auth::ServiceApiKeyRecord,
    tenancy::{FilterRegistry, RegistryError},
};

pub mod fleet;
pub mod shipments;
pub mod tenants;

/// Every persisted type and its standing filter. Built once at startup.
///
/// # Errors
///
/// Returns an error if two types share a storage kind.
pub fn filter_registry() -> Result<FilterRegistry, RegistryError> {
    FilterRegistry::builder()
        .register::<tenants::TenantRecord>()
        .register::<fleet::TruckRecord>()
        .register::<fleet::DriverRecord>()
        .register::<fleet::FleetLogRecord>()
        .register::<shipments::ShipmentRecord>()
        .register::<ServiceApiKeyRecord>()
        .build()
}
