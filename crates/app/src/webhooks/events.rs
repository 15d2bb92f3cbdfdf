//! Event payloads and the envelope they travel in.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        fleet::{DriverUuid, FleetLogReason, FleetLogUuid, TruckUuid},
        shipments::{ShipmentStatus, ShipmentUuid},
        tenants::TenantUuid,
    },
    tenancy::CorrelationUuid,
};

use super::WebhookError;

/// An event body the automation host understands.
pub trait WebhookPayload: Serialize {
    /// Routing key, also sent as the envelope's `event_type`.
    const EVENT_TYPE: &'static str;

    /// The tenant the event belongs to, if it belongs to one.
    fn tenant(&self) -> Option<TenantUuid>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentCreated {
    pub tenant_id: Option<TenantUuid>,
    pub shipment_id: ShipmentUuid,
    pub tracking_number: String,
    pub status: ShipmentStatus,
}

impl WebhookPayload for ShipmentCreated {
    const EVENT_TYPE: &'static str = "shipment.created";

    fn tenant(&self) -> Option<TenantUuid> {
        self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentStatusChanged {
    pub tenant_id: Option<TenantUuid>,
    pub shipment_id: ShipmentUuid,
    pub tracking_number: String,
    pub old_status: ShipmentStatus,
    pub new_status: ShipmentStatus,
}

impl WebhookPayload for ShipmentStatusChanged {
    const EVENT_TYPE: &'static str = "shipment.status_changed";

    fn tenant(&self) -> Option<TenantUuid> {
        self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentException {
    pub tenant_id: Option<TenantUuid>,
    pub shipment_id: ShipmentUuid,
    pub tracking_number: String,
    pub reason: Option<String>,
}

impl WebhookPayload for ShipmentException {
    const EVENT_TYPE: &'static str = "shipment.exception";

    fn tenant(&self) -> Option<TenantUuid> {
        self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentAssigned {
    pub tenant_id: Option<TenantUuid>,
    pub shipment_id: ShipmentUuid,
    pub tracking_number: String,
    pub truck_id: Option<TruckUuid>,
    pub driver_id: Option<DriverUuid>,
}

impl WebhookPayload for ShipmentAssigned {
    const EVENT_TYPE: &'static str = "shipment.assigned";

    fn tenant(&self) -> Option<TenantUuid> {
        self.tenant_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverReassigned {
    pub tenant_id: Option<TenantUuid>,
    pub driver_id: DriverUuid,
    pub fleet_log_id: FleetLogUuid,
    pub old_truck_id: Option<TruckUuid>,
    pub new_truck_id: TruckUuid,
    pub reason: FleetLogReason,
    pub reassigned_at: Timestamp,
}

impl WebhookPayload for DriverReassigned {
    const EVENT_TYPE: &'static str = "fleet.driver_reassigned";

    fn tenant(&self) -> Option<TenantUuid> {
        self.tenant_id
    }
}

/// A payload already rendered to JSON, so publishers need not be generic.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    pub event_type: &'static str,
    pub tenant: Option<TenantUuid>,
    pub payload: Value,
}

impl OutboundEvent {
    /// # Errors
    ///
    /// Returns an error if the payload cannot be serialized.
    pub fn from_payload<P: WebhookPayload>(payload: &P) -> Result<Self, WebhookError> {
        Ok(Self {
            event_type: P::EVENT_TYPE,
            tenant: payload.tenant(),
            payload: serde_json::to_value(payload).map_err(WebhookError::Payload)?,
        })
    }
}

/// What is POSTed to the automation host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub event_type: String,
    pub timestamp: Timestamp,
    pub correlation_id: CorrelationUuid,

    /// Lets the receiver call back into the service routes as this tenant.
    pub callback_token: String,

    pub payload: Value,
}
