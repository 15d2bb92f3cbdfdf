//! Staged changes awaiting commit.

use std::{any::Any, fmt::Debug};

use uuid::Uuid;

use crate::{
    domain::tenants::TenantUuid,
    entity::{Entity, EntityMeta},
    store::Row,
};

/// Object-safe view of an [`Entity`] so changes of every type can be staged
/// together.
pub(crate) trait TrackedEntity: Send + Sync + Debug {
    fn kind(&self) -> &'static str;

    fn is_tenant_scoped(&self) -> bool;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn tenant_uuid(&self) -> Option<TenantUuid>;

    fn assign_tenant(&mut self, tenant: TenantUuid);

    fn to_row(&self) -> Result<Row, serde_json::Error>;

    fn as_any(&self) -> &dyn Any;
}

impl<E: Entity> TrackedEntity for E {
    fn kind(&self) -> &'static str {
        E::KIND
    }

    fn is_tenant_scoped(&self) -> bool {
        E::TENANT_SCOPED
    }

    fn meta(&self) -> &EntityMeta {
        Entity::meta(self)
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        Entity::meta_mut(self)
    }

    fn tenant_uuid(&self) -> Option<TenantUuid> {
        Entity::tenant_uuid(self)
    }

    fn assign_tenant(&mut self, tenant: TenantUuid) {
        Entity::assign_tenant(self, tenant);
    }

    fn to_row(&self) -> Result<Row, serde_json::Error> {
        let meta = Entity::meta(self);

        Ok(Row {
            kind: E::KIND.to_string(),
            uuid: meta.uuid,
            tenant_uuid: Entity::tenant_uuid(self),
            deleted: meta.deleted,
            created_at: meta.created_at,
            data: serde_json::to_value(self)?,
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Added,
    Modified,
    Removed,
}

/// The persisted state a modification started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Original {
    pub(crate) tenant: Option<TenantUuid>,
    pub(crate) meta: EntityMeta,
}

#[derive(Debug)]
pub(crate) struct TrackedEntry {
    pub(crate) state: EntryState,
    pub(crate) entity: Box<dyn TrackedEntity>,
    pub(crate) original: Option<Original>,
}

impl TrackedEntry {
    pub(crate) fn is(&self, kind: &str, uuid: Uuid) -> bool {
        self.entity.kind() == kind && self.entity.meta().uuid == uuid
    }
}

#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    entries: Vec<TrackedEntry>,
}

impl ChangeTracker {
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn get(&self, kind: &str, uuid: Uuid) -> Option<&TrackedEntry> {
        self.entries.iter().find(|entry| entry.is(kind, uuid))
    }

    pub(crate) fn get_mut(&mut self, kind: &str, uuid: Uuid) -> Option<&mut TrackedEntry> {
        self.entries.iter_mut().find(|entry| entry.is(kind, uuid))
    }

    pub(crate) fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a TrackedEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.entity.kind() == kind)
    }

    pub(crate) fn push(&mut self, entry: TrackedEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn remove(&mut self, kind: &str, uuid: Uuid) -> Option<TrackedEntry> {
        let index = self.entries.iter().position(|entry| entry.is(kind, uuid))?;

        Some(self.entries.remove(index))
    }

    pub(crate) fn entries(&self) -> &[TrackedEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [TrackedEntry] {
        &mut self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
