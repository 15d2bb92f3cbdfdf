//! Driver Reassignment Handler

use std::sync::Arc;

use salvo::{
    oapi::{
        ToSchema,
        extract::{JsonBody, PathParam},
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waybill_app::{
    TypedUuid,
    auth::scopes::FLEET_WRITE,
    domain::fleet::{FleetLogReason, FleetLogRecord, data::DriverReassignment},
    entity::Entity,
};

use crate::{extensions::*, service::into_status_error, state::State};

/// Why the driver is moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ReassignmentReason {
    Assignment,
    Breakdown,
    Maintenance,
    ShiftChange,
    Other,
}

impl From<ReassignmentReason> for FleetLogReason {
    fn from(reason: ReassignmentReason) -> Self {
        match reason {
            ReassignmentReason::Assignment => Self::Assignment,
            ReassignmentReason::Breakdown => Self::Breakdown,
            ReassignmentReason::Maintenance => Self::Maintenance,
            ReassignmentReason::ShiftChange => Self::ShiftChange,
            ReassignmentReason::Other => Self::Other,
        }
    }
}

impl From<FleetLogReason> for ReassignmentReason {
    fn from(reason: FleetLogReason) -> Self {
        match reason {
            FleetLogReason::Assignment => Self::Assignment,
            FleetLogReason::Breakdown => Self::Breakdown,
            FleetLogReason::Maintenance => Self::Maintenance,
            FleetLogReason::ShiftChange => Self::ShiftChange,
            FleetLogReason::Other => Self::Other,
        }
    }
}

/// Reassign Driver Request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReassignDriverRequest {
    /// Truck the driver moves onto
    pub truck_id: Uuid,

    #[serde(default = "default_reason")]
    pub reason: ReassignmentReason,
}

const fn default_reason() -> ReassignmentReason {
    ReassignmentReason::Assignment
}

/// The fleet log entry recording the move.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct ReassignmentResponse {
    pub uuid: Uuid,
    pub driver_id: Uuid,
    pub old_truck_id: Option<Uuid>,
    pub new_truck_id: Uuid,
    pub reason: ReassignmentReason,
    pub reassigned_at: String,
}

impl From<FleetLogRecord> for ReassignmentResponse {
    fn from(log: FleetLogRecord) -> Self {
        Self {
            uuid: log.uuid().into_uuid(),
            driver_id: log.driver.into_uuid(),
            old_truck_id: log.old_truck.map(TypedUuid::into_uuid),
            new_truck_id: log.new_truck.into_uuid(),
            reason: log.reason.into(),
            reassigned_at: log.reassigned_at.to_string(),
        }
    }
}

/// Driver Reassignment Handler
///
/// Moves a driver onto another truck and returns the fleet log entry.
#[endpoint(
    tags("service"),
    summary = "Reassign Driver",
    security(("bearer_auth" = []), ("service_key" = [])),
    responses(
        (status_code = StatusCode::OK, description = "Driver reassigned"),
        (status_code = StatusCode::NOT_FOUND, description = "Driver or truck not found"),
        (status_code = StatusCode::CONFLICT, description = "Truck inactive or already assigned"),
        (status_code = StatusCode::FORBIDDEN, description = "Missing fleet:write scope"),
    ),
)]
#[tracing::instrument(
    name = "drivers.reassign",
    skip(driver, json, depot),
    fields(
        tenant_uuid = tracing::field::Empty,
        driver_uuid = tracing::field::Empty,
        truck_uuid = tracing::field::Empty
    ),
    err
)]
pub(crate) async fn handler(
    driver: PathParam<Uuid>,
    json: JsonBody<ReassignDriverRequest>,
    depot: &mut Depot,
) -> Result<Json<ReassignmentResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let service = depot.service_with_scope(FLEET_WRITE)?;
    let request = json.into_inner();
    let driver = driver.into_inner();

    let span = tracing::Span::current();

    span.record("tenant_uuid", tracing::field::display(service.tenant));
    span.record("driver_uuid", tracing::field::display(driver));
    span.record("truck_uuid", tracing::field::display(request.truck_id));

    let log = state
        .fleet
        .reassign_driver(
            service.request_context(),
            DriverReassignment {
                driver: TypedUuid::from_uuid(driver),
                truck: TypedUuid::from_uuid(request.truck_id),
                reason: request.reason.into(),
            },
        )
        .await
        .map_err(into_status_error)?;

    tracing::info!(driver_uuid = %driver, truck_uuid = %request.truck_id, "reassigned driver");

    Ok(Json(log.into()))
}
