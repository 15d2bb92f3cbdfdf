//! Fleet Records

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::{
    domain::tenants::TenantUuid,
    entity::{EntityMeta, impl_entity},
    persistence::{PersistenceError, Repository, UnitOfWork},
    uuids::TypedUuid,
};

pub type TruckUuid = TypedUuid<TruckRecord>;
pub type DriverUuid = TypedUuid<DriverRecord>;
pub type FleetLogUuid = TypedUuid<FleetLogRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckType {
    BoxTruck,
    Flatbed,
    Refrigerated,
    Tanker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Available,
    OnDuty,
    OffDuty,
}

/// Why a driver changed trucks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetLogReason {
    Assignment,
    Breakdown,
    Maintenance,
    ShiftChange,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruckRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    pub tenant_uuid: Option<TenantUuid>,

    /// Registration plate, unique per tenant.
    pub plate: String,

    pub model: String,

    pub truck_type: TruckType,

    pub max_capacity_kg: u32,

    /// Inactive trucks cannot receive drivers.
    pub active: bool,
}

impl_entity!(TruckRecord, kind = "trucks", tenant_scoped, search = ["plate", "model"]);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    pub tenant_uuid: Option<TenantUuid>,

    pub full_name: String,

    pub license_number: String,

    pub status: DriverStatus,

    /// The truck the driver normally operates.
    pub default_truck: Option<TruckUuid>,

    /// The truck the driver operates right now.
    pub current_truck: Option<TruckUuid>,
}

impl_entity!(
    DriverRecord,
    kind = "drivers",
    tenant_scoped,
    search = ["full_name", "license_number"]
);

/// One driver reassignment. Written in the same transaction as the driver
/// change it records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetLogRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    pub tenant_uuid: Option<TenantUuid>,

    pub driver: DriverUuid,

    pub old_truck: Option<TruckUuid>,

    pub new_truck: TruckUuid,

    pub reason: FleetLogReason,

    pub reassigned_at: Timestamp,
}

impl_entity!(FleetLogRecord, kind = "fleet_logs", tenant_scoped, search = []);

impl UnitOfWork {
    /// # Errors
    ///
    /// Returns an error if trucks are not registered.
    pub fn trucks(&mut self) -> Result<Repository<'_, TruckRecord>, PersistenceError> {
        self.repository()
    }

    /// # Errors
    ///
    /// Returns an error if drivers are not registered.
    pub fn drivers(&mut self) -> Result<Repository<'_, DriverRecord>, PersistenceError> {
        self.repository()
    }

    /// # Errors
    ///
    /// Returns an error if fleet logs are not registered.
    pub fn fleet_logs(&mut self) -> Result<Repository<'_, FleetLogRecord>, PersistenceError> {
        self.repository()
    }
}
