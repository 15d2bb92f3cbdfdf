//! Shipments service.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::info;

use crate::{
    domain::shipments::{
        data::{NewShipment, ShipmentAssignment, ShipmentStatusUpdate},
        errors::ShipmentsServiceError,
        records::{ShipmentRecord, ShipmentStatus, ShipmentUuid},
    },
    entity::{Entity, EntityMeta},
    persistence::{Page, PageRequest, UnitOfWork, UnitOfWorkFactory},
    tenancy::RequestContext,
    webhooks::{
        WebhookPublisher,
        events::{ShipmentAssigned, ShipmentCreated, ShipmentException, ShipmentStatusChanged},
        publish_payload,
    },
};

#[derive(Clone)]
pub struct UowShipmentsService {
    units: UnitOfWorkFactory,
    webhooks: Arc<dyn WebhookPublisher>,
}

impl fmt::Debug for UowShipmentsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UowShipmentsService")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl UowShipmentsService {
    #[must_use]
    pub fn new(units: UnitOfWorkFactory, webhooks: Arc<dyn WebhookPublisher>) -> Self {
        Self { units, webhooks }
    }

    async fn load(
        uow: &mut UnitOfWork,
        shipment: ShipmentUuid,
    ) -> Result<ShipmentRecord, ShipmentsServiceError> {
        uow.shipments()?
            .get(shipment)
            .await?
            .ok_or(ShipmentsServiceError::NotFound)
    }

    async fn save(
        uow: &mut UnitOfWork,
        shipment: ShipmentRecord,
    ) -> Result<ShipmentRecord, ShipmentsServiceError> {
        let uuid = shipment.uuid();

        uow.shipments()?.update(shipment).await?;
        uow.save_changes().await?;

        Self::load(uow, uuid).await
    }
}

#[async_trait]
impl ShipmentsService for UowShipmentsService {
    async fn create_shipment(
        &self,
        context: RequestContext,
        shipment: NewShipment,
    ) -> Result<ShipmentRecord, ShipmentsServiceError> {
        let tracking_number = shipment.tracking_number.trim();

        if tracking_number.is_empty() {
            return Err(ShipmentsServiceError::MissingTrackingNumber);
        }

        let mut uow = self.units.create(context).await?;

        if uow
            .shipments()?
            .exists(|existing| existing.tracking_number == tracking_number)
            .await?
        {
            return Err(ShipmentsServiceError::DuplicateTrackingNumber);
        }

        let record = uow.shipments()?.insert(ShipmentRecord {
            meta: EntityMeta::unsaved(),
            tenant_uuid: None,
            tracking_number: tracking_number.to_string(),
            status: ShipmentStatus::Booked,
            truck: None,
            driver: None,
            exception_reason: None,
        })?;

        uow.save_changes().await?;

        let created = Self::load(&mut uow, record.uuid()).await?;

        info!(
            tenant_uuid = ?created.tenant_uuid,
            shipment_uuid = %created.uuid(),
            tracking_number = %created.tracking_number,
            "shipment created"
        );

        publish_payload(
            self.webhooks.as_ref(),
            &ShipmentCreated {
                tenant_id: created.tenant_uuid,
                shipment_id: created.uuid(),
                tracking_number: created.tracking_number.clone(),
                status: created.status,
            },
        );

        Ok(created)
    }

    async fn update_status(
        &self,
        context: RequestContext,
        shipment: ShipmentUuid,
        update: ShipmentStatusUpdate,
    ) -> Result<ShipmentRecord, ShipmentsServiceError> {
        let mut uow = self.units.create(context).await?;

        let mut record = Self::load(&mut uow, shipment).await?;

        if record.status.is_final() {
            return Err(ShipmentsServiceError::Finalized(record.status));
        }

        let old_status = record.status;

        record.status = update.status;
        record.exception_reason = (update.status == ShipmentStatus::Exception)
            .then_some(update.reason)
            .flatten();

        let updated = Self::save(&mut uow, record).await?;

        if old_status != updated.status {
            publish_payload(
                self.webhooks.as_ref(),
                &ShipmentStatusChanged {
                    tenant_id: updated.tenant_uuid,
                    shipment_id: updated.uuid(),
                    tracking_number: updated.tracking_number.clone(),
                    old_status,
                    new_status: updated.status,
                },
            );
        }

        if updated.status == ShipmentStatus::Exception {
            publish_payload(
                self.webhooks.as_ref(),
                &ShipmentException {
                    tenant_id: updated.tenant_uuid,
                    shipment_id: updated.uuid(),
                    tracking_number: updated.tracking_number.clone(),
                    reason: updated.exception_reason.clone(),
                },
            );
        }

        Ok(updated)
    }

    async fn assign_shipment(
        &self,
        context: RequestContext,
        shipment: ShipmentUuid,
        assignment: ShipmentAssignment,
    ) -> Result<ShipmentRecord, ShipmentsServiceError> {
        let mut uow = self.units.create(context).await?;

        let mut record = Self::load(&mut uow, shipment).await?;

        if record.status.is_final() {
            return Err(ShipmentsServiceError::Finalized(record.status));
        }

        if let Some(truck) = assignment.truck
            && uow.trucks()?.get(truck).await?.is_none()
        {
            return Err(ShipmentsServiceError::TruckNotFound);
        }

        if let Some(driver) = assignment.driver
            && uow.drivers()?.get(driver).await?.is_none()
        {
            return Err(ShipmentsServiceError::DriverNotFound);
        }

        record.truck = assignment.truck;
        record.driver = assignment.driver;

        let assigned = Self::save(&mut uow, record).await?;

        publish_payload(
            self.webhooks.as_ref(),
            &ShipmentAssigned {
                tenant_id: assigned.tenant_uuid,
                shipment_id: assigned.uuid(),
                tracking_number: assigned.tracking_number.clone(),
                truck_id: assigned.truck,
                driver_id: assigned.driver,
            },
        );

        Ok(assigned)
    }

    async fn list_shipments(
        &self,
        context: RequestContext,
        request: PageRequest,
    ) -> Result<Page<ShipmentRecord>, ShipmentsServiceError> {
        let mut uow = self.units.create(context).await?;

        Ok(uow.shipments()?.page(&request).await?)
    }
}

#[automock]
#[async_trait]
/// Shipments within one tenant. Every call runs in its own unit of work
/// bound to `context`.
pub trait ShipmentsService: Send + Sync {
    /// Books a shipment and announces it with `shipment.created`.
    async fn create_shipment(
        &self,
        context: RequestContext,
        shipment: NewShipment,
    ) -> Result<ShipmentRecord, ShipmentsServiceError>;

    /// Moves a shipment to a new status. Entering the exception status also
    /// raises `shipment.exception`.
    async fn update_status(
        &self,
        context: RequestContext,
        shipment: ShipmentUuid,
        update: ShipmentStatusUpdate,
    ) -> Result<ShipmentRecord, ShipmentsServiceError>;

    async fn assign_shipment(
        &self,
        context: RequestContext,
        shipment: ShipmentUuid,
        assignment: ShipmentAssignment,
    ) -> Result<ShipmentRecord, ShipmentsServiceError>;

    async fn list_shipments(
        &self,
        context: RequestContext,
        request: PageRequest,
    ) -> Result<Page<ShipmentRecord>, ShipmentsServiceError>;
}
