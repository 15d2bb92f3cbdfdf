//! Audit stamping applied to staged changes right before they are written.

use jiff::Timestamp;

use crate::tenancy::RequestContext;

use super::tracker::{EntryState, TrackedEntry};

/// Stamps creation, modification, deletion and tenant fields on staged
/// entries. Runs exactly once per commit and never fails; anything it cannot
/// fix is left for the isolation checks to reject.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditInterceptor;

impl AuditInterceptor {
    pub(crate) fn stamp(self, context: &RequestContext, now: Timestamp, entries: &mut [TrackedEntry]) {
        for entry in entries {
            match entry.state {
                EntryState::Added => Self::stamp_added(context, now, entry),
                EntryState::Modified => Self::stamp_modified(context, now, entry),
                EntryState::Removed => {}
            }
        }
    }

    fn stamp_added(context: &RequestContext, now: Timestamp, entry: &mut TrackedEntry) {
        let entity = &mut entry.entity;

        if entity.is_tenant_scoped()
            && entity.tenant_uuid().is_none()
            && let Some(tenant) = context.tenant()
        {
            entity.assign_tenant(tenant);
        }

        let meta = entity.meta_mut();

        meta.created_at = now;
        meta.created_by = context.actor();
        meta.updated_at = None;
        meta.updated_by = None;
        meta.deleted = false;
        meta.deleted_at = None;
        meta.version = 0;
    }

    fn stamp_modified(context: &RequestContext, now: Timestamp, entry: &mut TrackedEntry) {
        let meta = entry.entity.meta_mut();

        if let Some(original) = &entry.original {
            meta.created_at = original.meta.created_at;
            meta.created_by = original.meta.created_by;
            meta.version = original.meta.version.saturating_add(1);

            if original.meta.deleted {
                meta.deleted = true;
                meta.deleted_at = original.meta.deleted_at.or(meta.deleted_at);
            }
        }

        meta.updated_at = Some(now);
        meta.updated_by = context.actor();

        if meta.deleted && meta.deleted_at.is_none() {
            meta.deleted_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use crate::{
        domain::tenants::{TenantRecord, TenantUuid},
        entity::{Entity, EntityMeta},
        persistence::tracker::Original,
        tenancy::{ActorUuid, SystemOperation},
        test::helpers::make_truck,
    };

    use super::*;

    fn now() -> Timestamp {
        Timestamp::from_second(1_800_000_000).unwrap_or(Timestamp::UNIX_EPOCH)
    }

    fn added(entity: impl Entity) -> TrackedEntry {
        TrackedEntry {
            state: EntryState::Added,
            entity: Box::new(entity),
            original: None,
        }
    }

    #[test]
    fn added_entries_get_creation_stamps_and_ambient_tenant() {
        let tenant = TenantUuid::new();
        let actor = ActorUuid::new();
        let context = RequestContext::for_tenant(tenant).with_actor(actor);

        let mut truck = make_truck("AB-123");
        truck.meta.deleted = true;
        truck.meta.created_at = Timestamp::UNIX_EPOCH;

        let mut entries = [added(truck)];

        AuditInterceptor.stamp(&context, now(), &mut entries);

        let [entry] = &entries;
        let meta = entry.entity.meta();

        assert_eq!(meta.created_at, now());
        assert_eq!(meta.created_by, Some(actor));
        assert!(!meta.deleted, "new rows are never born deleted");
        assert_eq!(entry.entity.tenant_uuid(), Some(tenant));
    }

    #[test]
    fn explicit_tenant_is_left_for_the_isolation_check() {
        let tenant = TenantUuid::new();
        let other = TenantUuid::new();

        let mut truck = make_truck("AB-123");
        truck.tenant_uuid = Some(other);

        let mut entries = [added(truck)];

        AuditInterceptor.stamp(&RequestContext::for_tenant(tenant), now(), &mut entries);

        let [entry] = &entries;

        assert_eq!(entry.entity.tenant_uuid(), Some(other));
    }

    #[test]
    fn global_entities_never_get_a_tenant() {
        let mut entries = [added(TenantRecord::new("Acme", "ops@acme.test"))];

        AuditInterceptor.stamp(
            &RequestContext::for_tenant(TenantUuid::new()),
            now(),
            &mut entries,
        );

        let [entry] = &entries;

        assert_eq!(entry.entity.tenant_uuid(), None);
    }

    #[test]
    fn modified_entries_keep_creation_stamps() {
        let created = Timestamp::UNIX_EPOCH;
        let creator = ActorUuid::new();
        let editor = ActorUuid::new();

        let mut original_meta = EntityMeta::with_uuid(uuid::Uuid::now_v7());
        original_meta.created_at = created;
        original_meta.created_by = Some(creator);

        let mut truck = make_truck("AB-123");
        truck.meta = original_meta.clone();
        truck.meta.created_at = now();
        truck.meta.created_by = None;

        let mut entries = [TrackedEntry {
            state: EntryState::Modified,
            entity: Box::new(truck),
            original: Some(Original {
                tenant: None,
                meta: original_meta,
            }),
        }];

        AuditInterceptor.stamp(
            &RequestContext::system(SystemOperation::Maintenance).with_actor(editor),
            now(),
            &mut entries,
        );

        let [entry] = &entries;
        let meta = entry.entity.meta();

        assert_eq!(meta.created_at, created);
        assert_eq!(meta.created_by, Some(creator));
        assert_eq!(meta.updated_at, Some(now()));
        assert_eq!(meta.updated_by, Some(editor));
        assert_eq!(meta.version, 1);
    }

    #[test]
    fn deletion_time_is_set_once() {
        let first = now();
        let later = first + SignedDuration::from_hours(1);

        let mut truck = make_truck("AB-123");
        truck.meta.deleted = true;

        let mut entries = [TrackedEntry {
            state: EntryState::Modified,
            entity: Box::new(truck),
            original: None,
        }];

        let context = RequestContext::for_tenant(TenantUuid::new());

        AuditInterceptor.stamp(&context, first, &mut entries);
        AuditInterceptor.stamp(&context, later, &mut entries);

        let [entry] = &entries;

        assert_eq!(entry.entity.meta().deleted_at, Some(first));
    }

    #[test]
    fn deleted_rows_cannot_be_revived() {
        let deleted_at = now();

        let mut original_meta = EntityMeta::with_uuid(uuid::Uuid::now_v7());
        original_meta.deleted = true;
        original_meta.deleted_at = Some(deleted_at);

        let mut truck = make_truck("AB-123");
        truck.meta = original_meta.clone();
        truck.meta.deleted = false;
        truck.meta.deleted_at = None;

        let mut entries = [TrackedEntry {
            state: EntryState::Modified,
            entity: Box::new(truck),
            original: Some(Original {
                tenant: None,
                meta: original_meta,
            }),
        }];

        AuditInterceptor.stamp(
            &RequestContext::system(SystemOperation::Maintenance),
            now() + SignedDuration::from_hours(2),
            &mut entries,
        );

        let [entry] = &entries;

        assert!(entry.entity.meta().deleted);
        assert_eq!(entry.entity.meta().deleted_at, Some(deleted_at));
    }
}
