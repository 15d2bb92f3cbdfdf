//! Truck Index Handler

use std::sync::Arc;

use salvo::{
    oapi::{ToSchema, extract::QueryParam},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use waybill_app::{
    auth::scopes::FLEET_READ,
    domain::fleet::{TruckRecord, TruckType},
    entity::Entity,
    persistence::{DEFAULT_PAGE_SIZE, Page, PageRequest},
};

use crate::{extensions::*, service::into_status_error, state::State};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TruckResponse {
    pub uuid: Uuid,
    pub plate: String,
    pub model: String,
    pub truck_type: String,
    pub max_capacity_kg: u32,
    pub active: bool,
}

impl From<TruckRecord> for TruckResponse {
    fn from(truck: TruckRecord) -> Self {
        let truck_type = match truck.truck_type {
            TruckType::BoxTruck => "box_truck",
            TruckType::Flatbed => "flatbed",
            TruckType::Refrigerated => "refrigerated",
            TruckType::Tanker => "tanker",
        };

        Self {
            uuid: truck.uuid().into_uuid(),
            plate: truck.plate,
            model: truck.model,
            truck_type: truck_type.to_string(),
            max_capacity_kg: truck.max_capacity_kg,
            active: truck.active,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub(crate) struct TrucksResponse {
    /// Trucks on this page
    pub trucks: Vec<TruckResponse>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub has_next_page: bool,
}

impl From<Page<TruckRecord>> for TrucksResponse {
    fn from(page: Page<TruckRecord>) -> Self {
        let total_pages = page.total_pages();
        let has_next_page = page.has_next_page();

        Self {
            total_count: page.total_count,
            page: page.page,
            page_size: page.page_size,
            total_pages,
            has_next_page,
            trucks: page.items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Truck Index Handler
///
/// Pages the caller's trucks, optionally filtered by plate or model.
#[endpoint(
    tags("service"),
    summary = "List Trucks",
    security(("bearer_auth" = []), ("service_key" = []))
)]
pub(crate) async fn handler(
    page: QueryParam<usize, false>,
    page_size: QueryParam<usize, false>,
    search: QueryParam<String, false>,
    depot: &mut Depot,
) -> Result<Json<TrucksResponse>, StatusError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let service = depot.service_with_scope(FLEET_READ)?;

    let mut request = PageRequest::new(
        page.into_inner().unwrap_or(1),
        page_size.into_inner().unwrap_or(DEFAULT_PAGE_SIZE),
    );

    if let Some(search) = search.into_inner() {
        request = request.with_search(search);
    }

    let trucks = state
        .fleet
        .list_trucks(service.request_context(), request)
        .await
        .map_err(into_status_error)?;

    Ok(Json(trucks.into()))
}
