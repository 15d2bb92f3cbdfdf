//! Unit of Work

use std::{any::TypeId, fmt, sync::Arc};

use jiff::Timestamp;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    clock::Clock,
    domain::tenants::{TenantRecord, TenantUuid},
    entity::Entity,
    store::{EntityStore, Row, RowChange, RowFilter, StoreSession, sort_rows},
    tenancy::{FilterRegistry, Registration, RequestContext, SystemOperation, TenantScope},
};

use super::{
    IsolationViolation, PersistenceError, Repository,
    audit::AuditInterceptor,
    tracker::{ChangeTracker, EntryState, TrackedEntry},
};

/// How a read treats staged changes and standing filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadMode {
    pub(crate) tracked: bool,
    pub(crate) unfiltered: bool,
}

impl ReadMode {
    pub(crate) const TRACKED: Self = Self {
        tracked: true,
        unfiltered: false,
    };

    pub(crate) const UNTRACKED: Self = Self {
        tracked: false,
        unfiltered: false,
    };

    pub(crate) const UNFILTERED: Self = Self {
        tracked: false,
        unfiltered: true,
    };
}

/// Row-level predicates a read pushes down to the store.
#[derive(Debug, Clone, Default)]
pub(crate) struct Lookup {
    pub(crate) uuid: Option<Uuid>,
    pub(crate) fields: Map<String, Value>,
}

impl Lookup {
    pub(crate) fn uuid(uuid: Uuid) -> Self {
        Self {
            uuid: Some(uuid),
            ..Self::default()
        }
    }
}

/// Opens units of work against a shared store, registry and clock.
#[derive(Debug, Clone)]
pub struct UnitOfWorkFactory {
    store: Arc<dyn EntityStore>,
    registry: Arc<FilterRegistry>,
    clock: Arc<dyn Clock>,
}

impl UnitOfWorkFactory {
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        registry: Arc<FilterRegistry>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Open a unit of work bound to `context` for its whole lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot open a session.
    pub async fn create(&self, context: RequestContext) -> Result<UnitOfWork, PersistenceError> {
        let session = self.store.open_session(context.tenant()).await?;

        Ok(UnitOfWork {
            context,
            registry: Arc::clone(&self.registry),
            clock: Arc::clone(&self.clock),
            session,
            tracker: ChangeTracker::default(),
            repositories: FxHashMap::default(),
            verified_tenants: FxHashSet::default(),
            audit: AuditInterceptor,
        })
    }
}

/// One request's worth of reads and staged writes, committed together.
///
/// Every read goes through the standing filters for the bound tenant scope,
/// and every commit is audited and isolation-checked before anything reaches
/// the store. Dropping a unit of work with an open transaction rolls it back.
pub struct UnitOfWork {
    context: RequestContext,
    registry: Arc<FilterRegistry>,
    clock: Arc<dyn Clock>,
    pub(crate) session: Box<dyn StoreSession>,
    pub(crate) tracker: ChangeTracker,
    repositories: FxHashMap<TypeId, Registration>,
    verified_tenants: FxHashSet<TenantUuid>,
    audit: AuditInterceptor,
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("context", &self.context)
            .field("staged", &self.tracker.len())
            .field("in_transaction", &self.session.in_transaction())
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    #[must_use]
    pub const fn context(&self) -> &RequestContext {
        &self.context
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// The repository for `E`. Repeated calls reuse the same registration.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Unregistered`] when `E` has no standing
    /// filter.
    pub fn repository<E: Entity>(&mut self) -> Result<Repository<'_, E>, PersistenceError> {
        let registration = self.registration::<E>()?;

        Ok(Repository::new(self, registration))
    }

    fn registration<E: Entity>(&mut self) -> Result<Registration, PersistenceError> {
        let type_id = TypeId::of::<E>();

        if let Some(registration) = self.repositories.get(&type_id) {
            return Ok(*registration);
        }

        let registration = self
            .registry
            .registration::<E>()
            .ok_or(PersistenceError::Unregistered(E::KIND))?;

        self.repositories.insert(type_id, registration);

        Ok(registration)
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.tracker.is_empty()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.session.in_transaction()
    }

    /// Audit, isolation-check and write every staged change, returning how
    /// many rows were affected.
    ///
    /// On failure nothing is written, staged changes are discarded and any
    /// open transaction is rolled back.
    ///
    /// # Errors
    ///
    /// Returns an error when a change crosses a tenant boundary or the store
    /// rejects the write.
    pub async fn save_changes(&mut self) -> Result<usize, PersistenceError> {
        if self.tracker.is_empty() {
            return Ok(0);
        }

        let result = self.flush().await;

        if let Err(error) = &result {
            debug!(error = %error, "commit failed; discarding staged changes");

            self.discard_after_failure().await;
        }

        result
    }

    async fn flush(&mut self) -> Result<usize, PersistenceError> {
        let now = self.clock.now();

        self.audit
            .stamp(&self.context, now, self.tracker.entries_mut());

        self.check_isolation().await?;

        let changes = self
            .tracker
            .entries()
            .iter()
            .map(row_change)
            .collect::<Result<Vec<_>, _>>()?;

        let count = changes.len();

        self.session.write(changes).await?;
        self.tracker.clear();

        Ok(count)
    }

    async fn discard_after_failure(&mut self) {
        self.tracker.clear();

        if self.session.in_transaction()
            && let Err(error) = self.session.rollback().await
        {
            warn!(error = %error, "failed to roll back transaction after commit failure");
        }
    }

    async fn check_isolation(&mut self) -> Result<(), PersistenceError> {
        let scope = self.context.scope();
        let mut new_tenant_refs = Vec::new();

        for entry in self.tracker.entries() {
            let kind = entry.entity.kind();

            match scope {
                TenantScope::System(operation) => {
                    if !operation.permits_mutation_of(kind) {
                        return Err(IsolationViolation::MutationNotPermitted { operation, kind }.into());
                    }

                    if entry.state == EntryState::Added && !operation.permits_inserts() {
                        return Err(IsolationViolation::InsertNotPermitted { operation, kind }.into());
                    }

                    if entry.state == EntryState::Removed && !operation.permits_hard_delete() {
                        return Err(IsolationViolation::HardDeleteNotPermitted.into());
                    }
                }
                TenantScope::Pinned(_) => {
                    if entry.state == EntryState::Removed {
                        return Err(IsolationViolation::HardDeleteNotPermitted.into());
                    }

                    if !entry.entity.is_tenant_scoped() {
                        return Err(IsolationViolation::GlobalRowInTenantScope { kind }.into());
                    }
                }
            }

            if !entry.entity.is_tenant_scoped() {
                continue;
            }

            let tenant = entry
                .entity
                .tenant_uuid()
                .ok_or(IsolationViolation::MissingTenant { kind })?;

            if scope.pinned_tenant().is_some_and(|pinned| pinned != tenant) {
                return Err(IsolationViolation::TenantMismatch { kind }.into());
            }

            if let Some(original) = &entry.original
                && original.tenant != Some(tenant)
            {
                return Err(IsolationViolation::TenantChanged { kind }.into());
            }

            if entry.state == EntryState::Added && !self.verified_tenants.contains(&tenant) {
                new_tenant_refs.push(tenant);
            }
        }

        for tenant in new_tenant_refs {
            self.verify_tenant(tenant).await?;
        }

        Ok(())
    }

    /// New tenant-scoped rows must point at a live, active tenant. A tenant
    /// staged in this same unit of work counts.
    async fn verify_tenant(&mut self, tenant: TenantUuid) -> Result<(), PersistenceError> {
        if self.verified_tenants.contains(&tenant) {
            return Ok(());
        }

        let record = if let Some(entry) = self.tracker.get(TenantRecord::KIND, tenant.into_uuid()) {
            entry
                .entity
                .as_any()
                .downcast_ref::<TenantRecord>()
                .filter(|_| entry.state != EntryState::Removed)
                .cloned()
        } else {
            let filter = RowFilter::default().with_uuid(tenant.into_uuid());

            self.session
                .fetch(TenantRecord::KIND, &filter)
                .await?
                .into_iter()
                .next()
                .map(|row| serde_json::from_value::<TenantRecord>(row.data))
                .transpose()?
        };

        let record = record.ok_or(IsolationViolation::UnknownTenant(tenant))?;

        if record.meta.deleted {
            return Err(IsolationViolation::UnknownTenant(tenant).into());
        }

        if !record.active {
            return Err(IsolationViolation::InactiveTenant(tenant).into());
        }

        self.verified_tenants.insert(tenant);

        Ok(())
    }

    /// Start an explicit transaction. Nesting is not supported.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::TransactionAlreadyOpen`] if one is open.
    pub async fn begin_transaction(&mut self) -> Result<(), PersistenceError> {
        if self.session.in_transaction() {
            return Err(PersistenceError::TransactionAlreadyOpen);
        }

        self.session.begin().await?;

        Ok(())
    }

    /// Save any staged changes and commit the open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no transaction is open or the commit fails, in
    /// which case everything since [`Self::begin_transaction`] is discarded.
    pub async fn commit_transaction(&mut self) -> Result<(), PersistenceError> {
        if !self.session.in_transaction() {
            return Err(PersistenceError::NoOpenTransaction);
        }

        self.save_changes().await?;

        if let Err(error) = self.session.commit().await {
            self.tracker.clear();

            return Err(error.into());
        }

        Ok(())
    }

    /// Discard staged changes and roll back the open transaction, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails to roll back.
    pub async fn rollback_transaction(&mut self) -> Result<(), PersistenceError> {
        self.tracker.clear();

        if self.session.in_transaction() {
            self.session.rollback().await?;
        }

        Ok(())
    }

    /// Rows of a registered kind visible under the current scope.
    pub(crate) async fn load_rows(
        &mut self,
        registration: Registration,
        lookup: &Lookup,
        mode: ReadMode,
    ) -> Result<Vec<Row>, PersistenceError> {
        let scope = self.context.scope();

        let mut filter = if mode.unfiltered {
            if !scope
                .system_operation()
                .is_some_and(SystemOperation::permits_unfiltered_reads)
            {
                return Err(IsolationViolation::UnfilteredReadNotPermitted.into());
            }

            RowFilter {
                include_deleted: true,
                ..RowFilter::default()
            }
        } else {
            registration.filter.row_filter(&scope)
        };

        filter.uuid = lookup.uuid;
        filter.fields.clone_from(&lookup.fields);

        let mut rows = self.session.fetch(registration.kind, &filter).await?;

        if !mode.unfiltered {
            rows.retain(|row| registration.filter.admits(row, &scope));
        }

        if mode.tracked {
            self.overlay_staged(registration.kind, &filter, &mut rows)?;
        }

        Ok(rows)
    }

    fn overlay_staged(
        &self,
        kind: &str,
        filter: &RowFilter,
        rows: &mut Vec<Row>,
    ) -> Result<(), PersistenceError> {
        let mut touched = false;

        for entry in self.tracker.of_kind(kind) {
            let uuid = entry.entity.meta().uuid;

            rows.retain(|row| row.uuid != uuid);
            touched = true;

            if entry.state == EntryState::Removed {
                continue;
            }

            let mut row = entry.entity.to_row()?;

            if row.tenant_uuid.is_none() && entry.entity.is_tenant_scoped() {
                row.tenant_uuid = self.context.tenant();
            }

            if filter.matches(&row) {
                rows.push(row);
            }
        }

        if touched {
            sort_rows(rows);
        }

        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.session.in_transaction() {
            warn!(
                staged = self.tracker.len(),
                "unit of work dropped with an open transaction; rolling back"
            );
        } else if !self.tracker.is_empty() {
            debug!(
                staged = self.tracker.len(),
                "unit of work dropped with uncommitted changes"
            );
        }
    }
}

fn row_change(entry: &TrackedEntry) -> Result<RowChange, serde_json::Error> {
    Ok(match entry.state {
        EntryState::Added => RowChange::Insert(entry.entity.to_row()?),
        EntryState::Modified => RowChange::Update {
            row: entry.entity.to_row()?,
            expected_version: entry.original.as_ref().map(|original| original.meta.version),
        },
        EntryState::Removed => RowChange::Delete {
            kind: entry.entity.kind().to_string(),
            uuid: entry.entity.meta().uuid,
        },
    })
}
