//! Shipment Records

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        fleet::{DriverUuid, TruckUuid},
        tenants::TenantUuid,
    },
    entity::{EntityMeta, impl_entity},
    persistence::{PersistenceError, Repository, UnitOfWork},
    uuids::TypedUuid,
};

pub type ShipmentUuid = TypedUuid<ShipmentRecord>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Booked,
    InTransit,
    Delivered,
    Exception,
    Cancelled,
}

impl ShipmentStatus {
    /// Delivered and cancelled shipments no longer change.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,

    pub tenant_uuid: Option<TenantUuid>,

    /// Unique per tenant.
    pub tracking_number: String,

    pub status: ShipmentStatus,

    pub truck: Option<TruckUuid>,

    pub driver: Option<DriverUuid>,

    /// Set while the shipment is in [`ShipmentStatus::Exception`].
    pub exception_reason: Option<String>,
}

impl_entity!(
    ShipmentRecord,
    kind = "shipments",
    tenant_scoped,
    search = ["tracking_number"]
);

impl UnitOfWork {
    /// # Errors
    ///
    /// Returns an error if shipments are not registered.
    pub fn shipments(&mut self) -> Result<Repository<'_, ShipmentRecord>, PersistenceError> {
        self.repository()
    }
}
