//! Fleet service.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use mockall::automock;
use tracing::{info, warn};

use crate::{
    domain::fleet::{
        data::{DriverReassignment, NewDriver, NewTruck},
        errors::FleetServiceError,
        records::{DriverRecord, DriverStatus, DriverUuid, FleetLogRecord, TruckRecord},
    },
    entity::{Entity, EntityMeta},
    persistence::{Page, PageRequest, PersistenceError, SortOrder, UnitOfWork, UnitOfWorkFactory},
    tenancy::RequestContext,
    webhooks::{WebhookPublisher, events::DriverReassigned, publish_payload},
};

#[derive(Clone)]
pub struct UowFleetService {
    units: UnitOfWorkFactory,
    webhooks: Arc<dyn WebhookPublisher>,
}

impl fmt::Debug for UowFleetService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UowFleetService")
            .field("units", &self.units)
            .finish_non_exhaustive()
    }
}

impl UowFleetService {
    #[must_use]
    pub fn new(units: UnitOfWorkFactory, webhooks: Arc<dyn WebhookPublisher>) -> Self {
        Self { units, webhooks }
    }

    /// Both writes of a reassignment, staged and flushed inside the caller's
    /// open transaction. Returns the log as written, stamps included.
    async fn apply_reassignment(
        uow: &mut UnitOfWork,
        reassignment: &DriverReassignment,
    ) -> Result<FleetLogRecord, FleetServiceError> {
        let mut driver = uow
            .drivers()?
            .get(reassignment.driver)
            .await?
            .ok_or(FleetServiceError::DriverNotFound)?;

        let truck = uow
            .trucks()?
            .get(reassignment.truck)
            .await?
            .ok_or(FleetServiceError::TruckNotFound)?;

        if !truck.active {
            return Err(FleetServiceError::TruckInactive);
        }

        let old_truck = driver.current_truck;

        if old_truck == Some(truck.uuid()) {
            return Err(FleetServiceError::AlreadyAssigned);
        }

        driver.current_truck = Some(truck.uuid());

        uow.drivers()?.update(driver).await?;

        let reassigned_at = uow.now();

        let log = uow.fleet_logs()?.insert(FleetLogRecord {
            meta: EntityMeta::unsaved(),
            tenant_uuid: None,
            driver: reassignment.driver,
            old_truck,
            new_truck: truck.uuid(),
            reason: reassignment.reason,
            reassigned_at,
        })?;

        uow.save_changes().await?;

        uow.fleet_logs()?
            .get(log.uuid())
            .await?
            .ok_or_else(|| PersistenceError::NotFound.into())
    }
}

#[async_trait]
impl FleetService for UowFleetService {
    async fn create_truck(
        &self,
        context: RequestContext,
        truck: NewTruck,
    ) -> Result<TruckRecord, FleetServiceError> {
        let plate = truck.plate.trim().to_uppercase();

        let mut uow = self.units.create(context).await?;

        if uow.trucks()?.exists(|existing| existing.plate == plate).await? {
            return Err(FleetServiceError::DuplicatePlate);
        }

        let record = uow.trucks()?.insert(TruckRecord {
            meta: EntityMeta::unsaved(),
            tenant_uuid: None,
            plate: plate.clone(),
            model: truck.model,
            truck_type: truck.truck_type,
            max_capacity_kg: truck.max_capacity_kg,
            active: true,
        })?;

        // Concurrent creates slip past the check above; the store's plate
        // index rejects the loser.
        uow.save_changes().await.map_err(|error| match error {
            PersistenceError::AlreadyExists => FleetServiceError::DuplicatePlate,
            error => error.into(),
        })?;

        uow.trucks()?
            .get(record.uuid())
            .await?
            .ok_or(FleetServiceError::TruckNotFound)
    }

    async fn create_driver(
        &self,
        context: RequestContext,
        driver: NewDriver,
    ) -> Result<DriverRecord, FleetServiceError> {
        let mut uow = self.units.create(context).await?;

        if let Some(truck) = driver.default_truck
            && uow.trucks()?.get(truck).await?.is_none()
        {
            return Err(FleetServiceError::TruckNotFound);
        }

        let record = uow.drivers()?.insert(DriverRecord {
            meta: EntityMeta::unsaved(),
            tenant_uuid: None,
            full_name: driver.full_name,
            license_number: driver.license_number,
            status: DriverStatus::Available,
            default_truck: driver.default_truck,
            current_truck: driver.default_truck,
        })?;

        uow.save_changes().await?;

        uow.drivers()?
            .get(record.uuid())
            .await?
            .ok_or(FleetServiceError::DriverNotFound)
    }

    async fn list_trucks(
        &self,
        context: RequestContext,
        request: PageRequest,
    ) -> Result<Page<TruckRecord>, FleetServiceError> {
        let mut uow = self.units.create(context).await?;

        Ok(uow.trucks()?.page(&request).await?)
    }

    async fn reassign_driver(
        &self,
        context: RequestContext,
        reassignment: DriverReassignment,
    ) -> Result<FleetLogRecord, FleetServiceError> {
        let mut uow = self.units.create(context).await?;

        uow.begin_transaction().await?;

        let log = match Self::apply_reassignment(&mut uow, &reassignment).await {
            Ok(log) => log,
            Err(error) => {
                if let Err(rollback) = uow.rollback_transaction().await {
                    warn!(error = %rollback, "failed to roll back driver reassignment");
                }

                return Err(error);
            }
        };

        uow.commit_transaction().await?;

        info!(
            tenant_uuid = ?log.tenant_uuid,
            driver_uuid = %log.driver,
            new_truck_uuid = %log.new_truck,
            "driver reassigned"
        );

        publish_payload(
            self.webhooks.as_ref(),
            &DriverReassigned {
                tenant_id: log.tenant_uuid,
                driver_id: log.driver,
                fleet_log_id: log.uuid(),
                old_truck_id: log.old_truck,
                new_truck_id: log.new_truck,
                reason: log.reason,
                reassigned_at: log.reassigned_at,
            },
        );

        Ok(log)
    }

    async fn history_for_driver(
        &self,
        context: RequestContext,
        driver: DriverUuid,
        request: PageRequest,
    ) -> Result<Page<FleetLogRecord>, FleetServiceError> {
        let mut uow = self.units.create(context).await?;

        if uow.drivers()?.get(driver).await?.is_none() {
            return Err(FleetServiceError::DriverNotFound);
        }

        let request = if request.sort().is_some() {
            request
        } else {
            request.with_sort(SortOrder::descending("reassigned_at"))
        };

        Ok(uow
            .fleet_logs()?
            .page_where(&request, move |log| log.driver == driver)
            .await?)
    }
}

#[automock]
#[async_trait]
/// Trucks, drivers and reassignments within one tenant. Every call runs in
/// its own unit of work bound to `context`.
pub trait FleetService: Send + Sync {
    /// Registers a truck. Plates are normalised to upper case and must be
    /// unique within the tenant.
    async fn create_truck(
        &self,
        context: RequestContext,
        truck: NewTruck,
    ) -> Result<TruckRecord, FleetServiceError>;

    async fn create_driver(
        &self,
        context: RequestContext,
        driver: NewDriver,
    ) -> Result<DriverRecord, FleetServiceError>;

    async fn list_trucks(
        &self,
        context: RequestContext,
        request: PageRequest,
    ) -> Result<Page<TruckRecord>, FleetServiceError>;

    /// Moves a driver onto another truck and records the move, atomically.
    /// Announces `fleet.driver_reassigned` once committed.
    async fn reassign_driver(
        &self,
        context: RequestContext,
        reassignment: DriverReassignment,
    ) -> Result<FleetLogRecord, FleetServiceError>;

    /// A driver's reassignments, most recent first unless sorted otherwise.
    async fn history_for_driver(
        &self,
        context: RequestContext,
        driver: DriverUuid,
        request: PageRequest,
    ) -> Result<Page<FleetLogRecord>, FleetServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use testresult::TestResult;

    use crate::{
        clock::Clock,
        domain::{
            fleet::records::{FleetLogReason, TruckType, TruckUuid},
            tenants::TenantUuid,
        },
        tenancy::SystemOperation,
        test::TestContext,
        webhooks::MockWebhookPublisher,
    };

    use super::*;

    fn quiet_webhooks() -> Arc<MockWebhookPublisher> {
        let mut webhooks = MockWebhookPublisher::new();
        webhooks.expect_publish().returning(|_| None);

        Arc::new(webhooks)
    }

    fn silent_webhooks() -> Arc<MockWebhookPublisher> {
        let mut webhooks = MockWebhookPublisher::new();
        webhooks.expect_publish().never();

        Arc::new(webhooks)
    }

    fn new_truck(plate: &str) -> NewTruck {
        NewTruck {
            plate: plate.to_string(),
            model: "Volvo FH16".to_string(),
            truck_type: TruckType::BoxTruck,
            max_capacity_kg: 18_000,
        }
    }

    struct Fleet {
        driver: DriverUuid,
        truck_x: TruckUuid,
        truck_y: TruckUuid,
    }

    async fn seed_fleet(
        svc: &UowFleetService,
        tenant: TenantUuid,
    ) -> Result<Fleet, FleetServiceError> {
        let context = RequestContext::for_tenant(tenant);

        let truck_x = svc.create_truck(context, new_truck("x-100")).await?;
        let truck_y = svc.create_truck(context, new_truck("y-200")).await?;

        let driver = svc
            .create_driver(
                context,
                NewDriver {
                    full_name: "Dana Driver".to_string(),
                    license_number: "DL-0001".to_string(),
                    default_truck: Some(truck_x.uuid()),
                },
            )
            .await?;

        Ok(Fleet {
            driver: driver.uuid(),
            truck_x: truck_x.uuid(),
            truck_y: truck_y.uuid(),
        })
    }

    fn move_to(fleet: &Fleet, truck: TruckUuid) -> DriverReassignment {
        DriverReassignment {
            driver: fleet.driver,
            truck,
            reason: FleetLogReason::Breakdown,
        }
    }

    #[tokio::test]
    async fn reassignment_updates_driver_and_appends_audited_log() -> TestResult {
        let ctx = TestContext::new().await;

        let mut webhooks = MockWebhookPublisher::new();
        webhooks
            .expect_publish()
            .withf(|event| event.event_type == "fleet.driver_reassigned")
            .times(1)
            .returning(|_| None);

        let svc = UowFleetService::new(ctx.units.clone(), Arc::new(webhooks));
        let fleet = seed_fleet(&svc, ctx.tenant_a).await?;

        ctx.clock.advance(SignedDuration::from_mins(5));

        let log = svc
            .reassign_driver(
                RequestContext::for_tenant(ctx.tenant_a),
                move_to(&fleet, fleet.truck_y),
            )
            .await?;

        assert_eq!(log.old_truck, Some(fleet.truck_x));
        assert_eq!(log.new_truck, fleet.truck_y);
        assert_eq!(log.tenant_uuid, Some(ctx.tenant_a));
        assert_eq!(log.meta.created_at, ctx.clock.now());
        assert_eq!(log.reassigned_at, ctx.clock.now());

        let mut uow = ctx.tenant_uow(ctx.tenant_a).await?;
        let driver = uow
            .drivers()?
            .get(fleet.driver)
            .await?
            .ok_or("driver should exist")?;

        assert_eq!(driver.current_truck, Some(fleet.truck_y));
        assert_eq!(driver.meta.updated_at, Some(ctx.clock.now()));
        assert_eq!(uow.fleet_logs()?.count().await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn reassignment_returns_and_publishes_the_committed_log() -> TestResult {
        let ctx = TestContext::new().await;
        let actor = crate::tenancy::ActorUuid::new();

        let mut webhooks = MockWebhookPublisher::new();
        webhooks
            .expect_publish()
            .withf(|event| event.event_type == "fleet.driver_reassigned")
            .times(1)
            .returning(|_| None);

        let svc = UowFleetService::new(ctx.units.clone(), Arc::new(webhooks));
        let fleet = seed_fleet(&svc, ctx.tenant_a).await?;

        let log = svc
            .reassign_driver(
                RequestContext::for_tenant(ctx.tenant_a).with_actor(actor),
                move_to(&fleet, fleet.truck_y),
            )
            .await?;

        let mut uow = ctx.tenant_uow(ctx.tenant_a).await?;
        let stored = uow
            .fleet_logs()?
            .get(log.uuid())
            .await?
            .ok_or("fleet log should be committed")?;

        assert_eq!(log, stored);
        assert_eq!(log.meta.created_by, Some(actor));

        Ok(())
    }

    #[tokio::test]
    async fn failed_reassignment_leaves_neither_write() -> TestResult {
        let ctx = TestContext::new().await;
        let fleet = seed_fleet(
            &UowFleetService::new(ctx.units.clone(), quiet_webhooks()),
            ctx.tenant_a,
        )
        .await?;

        let svc = UowFleetService::new(ctx.units.clone(), silent_webhooks());

        // Reports may read across tenants but never write, so the commit fails.
        let result = svc
            .reassign_driver(
                RequestContext::system(SystemOperation::CrossTenantReport),
                move_to(&fleet, fleet.truck_y),
            )
            .await;

        assert!(
            matches!(result, Err(FleetServiceError::Isolation(_))),
            "expected Isolation, got {result:?}"
        );

        let mut uow = ctx.tenant_uow(ctx.tenant_a).await?;
        let driver = uow
            .drivers()?
            .get(fleet.driver)
            .await?
            .ok_or("driver should exist")?;

        assert_eq!(driver.current_truck, Some(fleet.truck_x));
        assert_eq!(uow.fleet_logs()?.count().await?, 0);

        Ok(())
    }

    #[tokio::test]
    async fn other_tenants_cannot_reassign_a_driver() -> TestResult {
        let ctx = TestContext::new().await;
        let fleet = seed_fleet(
            &UowFleetService::new(ctx.units.clone(), quiet_webhooks()),
            ctx.tenant_a,
        )
        .await?;

        let svc = UowFleetService::new(ctx.units.clone(), silent_webhooks());

        let result = svc
            .reassign_driver(
                RequestContext::for_tenant(ctx.tenant_b),
                move_to(&fleet, fleet.truck_y),
            )
            .await;

        assert!(
            matches!(result, Err(FleetServiceError::DriverNotFound)),
            "expected DriverNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn reassigning_to_the_current_truck_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowFleetService::new(ctx.units.clone(), quiet_webhooks());
        let fleet = seed_fleet(&svc, ctx.tenant_a).await?;

        let result = svc
            .reassign_driver(
                RequestContext::for_tenant(ctx.tenant_a),
                move_to(&fleet, fleet.truck_x),
            )
            .await;

        assert!(
            matches!(result, Err(FleetServiceError::AlreadyAssigned)),
            "expected AlreadyAssigned, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn inactive_trucks_cannot_receive_drivers() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowFleetService::new(ctx.units.clone(), quiet_webhooks());
        let fleet = seed_fleet(&svc, ctx.tenant_a).await?;

        let mut uow = ctx.tenant_uow(ctx.tenant_a).await?;
        let mut truck = uow
            .trucks()?
            .get(fleet.truck_y)
            .await?
            .ok_or("truck should exist")?;
        truck.active = false;
        uow.trucks()?.update(truck).await?;
        uow.save_changes().await?;

        let result = svc
            .reassign_driver(
                RequestContext::for_tenant(ctx.tenant_a),
                move_to(&fleet, fleet.truck_y),
            )
            .await;

        assert!(
            matches!(result, Err(FleetServiceError::TruckInactive)),
            "expected TruckInactive, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_plates_are_rejected_within_a_tenant() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowFleetService::new(ctx.units.clone(), quiet_webhooks());

        svc.create_truck(RequestContext::for_tenant(ctx.tenant_a), new_truck("ab-123"))
            .await?;

        let duplicate = svc
            .create_truck(RequestContext::for_tenant(ctx.tenant_a), new_truck(" AB-123 "))
            .await;

        assert!(
            matches!(duplicate, Err(FleetServiceError::DuplicatePlate)),
            "expected DuplicatePlate, got {duplicate:?}"
        );

        svc.create_truck(RequestContext::for_tenant(ctx.tenant_b), new_truck("AB-123"))
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn history_lists_only_the_drivers_moves_newest_first() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowFleetService::new(ctx.units.clone(), quiet_webhooks());
        let fleet = seed_fleet(&svc, ctx.tenant_a).await?;
        let context = RequestContext::for_tenant(ctx.tenant_a);

        svc.reassign_driver(context, move_to(&fleet, fleet.truck_y))
            .await?;

        ctx.clock.advance(SignedDuration::from_mins(1));

        svc.reassign_driver(context, move_to(&fleet, fleet.truck_x))
            .await?;

        let history = svc
            .history_for_driver(context, fleet.driver, PageRequest::default())
            .await?;

        assert_eq!(history.total_count, 2);

        let newest = history.items.first().ok_or("history should not be empty")?;

        assert_eq!(newest.new_truck, fleet.truck_x);
        assert_eq!(newest.old_truck, Some(fleet.truck_y));

        let hidden = svc
            .history_for_driver(
                RequestContext::for_tenant(ctx.tenant_b),
                fleet.driver,
                PageRequest::default(),
            )
            .await;

        assert!(
            matches!(hidden, Err(FleetServiceError::DriverNotFound)),
            "expected DriverNotFound, got {hidden:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn list_trucks_searches_by_plate() -> TestResult {
        let ctx = TestContext::new().await;
        let svc = UowFleetService::new(ctx.units.clone(), quiet_webhooks());
        seed_fleet(&svc, ctx.tenant_a).await?;

        let page = svc
            .list_trucks(
                RequestContext::for_tenant(ctx.tenant_a),
                PageRequest::default().with_search("y-2"),
            )
            .await?;

        assert_eq!(page.total_count, 1);
        assert_eq!(
            page.items.first().map(|truck| truck.plate.as_str()),
            Some("Y-200")
        );

        Ok(())
    }
}
