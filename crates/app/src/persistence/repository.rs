//! Generic and tenant-aware repositories.

use std::{fmt, marker::PhantomData};

use serde_json::Value;
use uuid::Uuid;

use crate::{
    domain::tenants::TenantUuid,
    entity::{Entity, EntityMeta, TenantScoped},
    tenancy::{Registration, SystemOperation},
    uuids::TypedUuid,
};

use super::{
    IsolationViolation, Page, PageRequest, PersistenceError, SortOrder, UnitOfWork,
    paging::{compare_field, matches_search},
    tracker::{EntryState, Original, TrackedEntry},
    unit_of_work::{Lookup, ReadMode},
};

type Predicate<'a, E> = Box<dyn Fn(&E) -> bool + Send + Sync + 'a>;

/// Typed access to one entity kind inside a [`UnitOfWork`].
///
/// Reads see the unit of work's own staged changes unless they go through
/// [`Repository::query_untracked`]. Writes are staged and only reach the store
/// on [`UnitOfWork::save_changes`].
pub struct Repository<'u, E: Entity> {
    uow: &'u mut UnitOfWork,
    registration: Registration,
    entity: PhantomData<fn() -> E>,
}

impl<E: Entity> fmt::Debug for Repository<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("kind", &self.registration.kind)
            .finish_non_exhaustive()
    }
}

impl<'u, E: Entity> Repository<'u, E> {
    pub(crate) fn new(uow: &'u mut UnitOfWork, registration: Registration) -> Self {
        Self {
            uow,
            registration,
            entity: PhantomData,
        }
    }

    /// Reads that include this unit of work's uncommitted changes.
    pub fn query(&mut self) -> Query<'_, E> {
        Query::new(self.uow, self.registration, ReadMode::TRACKED)
    }

    /// Reads straight from the store, ignoring staged changes.
    pub fn query_untracked(&mut self) -> Query<'_, E> {
        Query::new(self.uow, self.registration, ReadMode::UNTRACKED)
    }

    /// Reads that bypass the standing filters, including soft-deleted rows
    /// and every tenant. Only reporting and maintenance scopes may use it;
    /// others get an isolation error when the query runs.
    pub fn query_unfiltered(&mut self) -> Query<'_, E> {
        Query::new(self.uow, self.registration, ReadMode::UNFILTERED)
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn get(&mut self, uuid: TypedUuid<E>) -> Result<Option<E>, PersistenceError> {
        self.query().uuid(uuid).first().await
    }

    /// Fetch an entity together with one related entity it points at.
    ///
    /// # Errors
    ///
    /// Returns an error if either read fails or `R` is not registered.
    pub async fn get_with<R, F>(
        &mut self,
        uuid: TypedUuid<E>,
        related: F,
    ) -> Result<Option<(E, Option<R>)>, PersistenceError>
    where
        R: Entity,
        F: FnOnce(&E) -> Option<TypedUuid<R>> + Send,
    {
        let Some(entity) = self.get(uuid).await? else {
            return Ok(None);
        };

        let related = match related(&entity) {
            Some(related) => self.uow.repository::<R>()?.get(related).await?,
            None => None,
        };

        Ok(Some((entity, related)))
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn all(&mut self) -> Result<Vec<E>, PersistenceError> {
        self.query().fetch().await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn find<'s, P>(&'s mut self, predicate: P) -> Result<Vec<E>, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        self.query().filter(predicate).fetch().await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn first<'s, P>(&'s mut self, predicate: P) -> Result<Option<E>, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        self.query().filter(predicate).first().await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn exists<'s, P>(&'s mut self, predicate: P) -> Result<bool, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        self.query().filter(predicate).exists().await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn count(&mut self) -> Result<usize, PersistenceError> {
        self.query().count().await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn count_where<'s, P>(&'s mut self, predicate: P) -> Result<usize, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        self.query().filter(predicate).count().await
    }

    /// One page, newest first unless the request names a sort field.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn page(&mut self, request: &PageRequest) -> Result<Page<E>, PersistenceError> {
        self.page_where(request, |_| true).await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn page_where<'s, P>(
        &'s mut self,
        request: &PageRequest,
        predicate: P,
    ) -> Result<Page<E>, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        let mut query = self
            .query_untracked()
            .filter(predicate)
            .skip(request.skip())
            .limit(request.page_size());

        if let Some(search) = request.search() {
            query = query.search(search);
        }

        if let Some(sort) = request.sort() {
            query = query.order_by(sort.clone());
        }

        let (items, total_count) = query.evaluate().await?;

        Ok(Page {
            items,
            total_count,
            page: request.page(),
            page_size: request.page_size(),
        })
    }

    /// Stage a new entity. A nil uuid is replaced with a generated one.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::AlreadyExists`] if an entity with the same
    /// uuid is already staged.
    pub fn insert(&mut self, mut entity: E) -> Result<E, PersistenceError> {
        let now = self.uow.now();
        let meta = entity.meta_mut();

        if meta.uuid.is_nil() {
            meta.uuid = Uuid::now_v7();
        }

        meta.created_at = now;
        meta.version = 0;

        let uuid = meta.uuid;

        if self.uow.tracker.get(E::KIND, uuid).is_some() {
            return Err(PersistenceError::AlreadyExists);
        }

        self.uow.tracker.push(TrackedEntry {
            state: EntryState::Added,
            entity: Box::new(entity.clone()),
            original: None,
        });

        Ok(entity)
    }

    /// # Errors
    ///
    /// See [`Repository::insert`].
    pub fn insert_many(
        &mut self,
        entities: impl IntoIterator<Item = E>,
    ) -> Result<Vec<E>, PersistenceError> {
        entities
            .into_iter()
            .map(|entity| self.insert(entity))
            .collect()
    }

    /// Stage changes to an entity visible under the current scope.
    ///
    /// The entity must carry the version it was loaded at. The same version
    /// is checked again when the change is written.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the entity is not visible,
    /// or [`PersistenceError::Stale`] if it changed since it was loaded.
    pub async fn update(&mut self, mut entity: E) -> Result<E, PersistenceError> {
        entity.meta_mut().updated_at = Some(self.uow.now());

        let uuid = entity.meta().uuid;
        let version = entity.meta().version;

        if let Some(entry) = self.uow.tracker.get_mut(E::KIND, uuid) {
            if entry.state == EntryState::Removed {
                return Err(PersistenceError::NotFound);
            }

            if entry
                .original
                .as_ref()
                .is_some_and(|original| original.meta.version != version)
            {
                return Err(PersistenceError::Stale);
            }

            entry.entity = Box::new(entity.clone());

            return Ok(entity);
        }

        let original = self
            .original(uuid)
            .await?
            .ok_or(PersistenceError::NotFound)?;

        if original.meta.version != version {
            return Err(PersistenceError::Stale);
        }

        self.uow.tracker.push(TrackedEntry {
            state: EntryState::Modified,
            entity: Box::new(entity.clone()),
            original: Some(original),
        });

        Ok(entity)
    }

    /// # Errors
    ///
    /// See [`Repository::update`].
    pub async fn update_many(&mut self, entities: Vec<E>) -> Result<Vec<E>, PersistenceError> {
        let mut updated = Vec::with_capacity(entities.len());

        for entity in entities {
            updated.push(self.update(entity).await?);
        }

        Ok(updated)
    }

    /// Mark an entity deleted. It disappears from filtered reads once saved.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] if the entity is not visible.
    pub async fn soft_delete(&mut self, mut entity: E) -> Result<(), PersistenceError> {
        let uuid = entity.meta().uuid;

        if self
            .uow
            .tracker
            .get(E::KIND, uuid)
            .is_some_and(|entry| entry.state == EntryState::Added)
        {
            self.uow.tracker.remove(E::KIND, uuid);

            return Ok(());
        }

        entity.meta_mut().deleted = true;

        self.update(entity).await.map(|_deleted| ())
    }

    /// # Errors
    ///
    /// See [`Repository::soft_delete`].
    pub async fn soft_delete_many(&mut self, entities: Vec<E>) -> Result<(), PersistenceError> {
        for entity in entities {
            self.soft_delete(entity).await?;
        }

        Ok(())
    }

    /// Permanently remove a row, deleted or not. Maintenance only.
    ///
    /// # Errors
    ///
    /// Returns an isolation error outside maintenance, or
    /// [`PersistenceError::NotFound`] if the row does not exist.
    pub async fn hard_delete(&mut self, uuid: TypedUuid<E>) -> Result<(), PersistenceError> {
        if !self
            .uow
            .context()
            .scope()
            .system_operation()
            .is_some_and(SystemOperation::permits_hard_delete)
        {
            return Err(IsolationViolation::HardDeleteNotPermitted.into());
        }

        let uuid = uuid.into_uuid();

        if let Some(entry) = self.uow.tracker.remove(E::KIND, uuid)
            && entry.state == EntryState::Added
        {
            return Ok(());
        }

        let row = self
            .uow
            .load_rows(self.registration, &Lookup::uuid(uuid), ReadMode::UNFILTERED)
            .await?
            .into_iter()
            .next()
            .ok_or(PersistenceError::NotFound)?;

        let entity: E = serde_json::from_value(row.data)?;
        let meta = entity.meta().clone();

        self.uow.tracker.push(TrackedEntry {
            state: EntryState::Removed,
            entity: Box::new(entity),
            original: Some(Original {
                tenant: row.tenant_uuid,
                meta,
            }),
        });

        Ok(())
    }

    async fn original(&mut self, uuid: Uuid) -> Result<Option<Original>, PersistenceError> {
        let Some(row) = self
            .uow
            .load_rows(self.registration, &Lookup::uuid(uuid), ReadMode::UNTRACKED)
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let meta: EntityMeta = serde_json::from_value(row.data)?;

        Ok(Some(Original {
            tenant: row.tenant_uuid,
            meta,
        }))
    }
}

impl<E: TenantScoped> Repository<'_, E> {
    /// Every live row belonging to `tenant`. Under a pinned scope for another
    /// tenant this is always empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn all_for_tenant(&mut self, tenant: TenantUuid) -> Result<Vec<E>, PersistenceError> {
        self.find_in_tenant(tenant, |_| true).await
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn find_in_tenant<'s, P>(
        &'s mut self,
        tenant: TenantUuid,
        predicate: P,
    ) -> Result<Vec<E>, PersistenceError>
    where
        P: Fn(&E) -> bool + Send + Sync + 's,
    {
        self.query()
            .filter(move |entity| entity.tenant_uuid() == Some(tenant))
            .filter(predicate)
            .fetch()
            .await
    }
}

/// A composable read over one entity kind.
pub struct Query<'a, E: Entity> {
    uow: &'a mut UnitOfWork,
    registration: Registration,
    mode: ReadMode,
    lookup: Lookup,
    predicates: Vec<Predicate<'a, E>>,
    search: Option<String>,
    sort: Option<SortOrder>,
    skip: usize,
    limit: Option<usize>,
}

impl<E: Entity> fmt::Debug for Query<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("kind", &self.registration.kind)
            .field("mode", &self.mode)
            .field("predicates", &self.predicates.len())
            .field("sort", &self.sort)
            .finish_non_exhaustive()
    }
}

impl<'a, E: Entity> Query<'a, E> {
    fn new(uow: &'a mut UnitOfWork, registration: Registration, mode: ReadMode) -> Self {
        Self {
            uow,
            registration,
            mode,
            lookup: Lookup::default(),
            predicates: Vec::new(),
            search: None,
            sort: None,
            skip: 0,
            limit: None,
        }
    }

    #[must_use]
    pub fn uuid(mut self, uuid: TypedUuid<E>) -> Self {
        self.lookup.uuid = Some(uuid.into_uuid());
        self
    }

    /// Exact match on a top-level document field, evaluated by the store.
    #[must_use]
    pub fn field_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.lookup.fields.insert(field.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'a) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Case-insensitive match over the kind's registered search fields.
    #[must_use]
    pub fn search(mut self, needle: &str) -> Self {
        self.search = Some(needle.to_string());
        self
    }

    #[must_use]
    pub fn order_by(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails or the scope forbids it.
    pub async fn fetch(self) -> Result<Vec<E>, PersistenceError> {
        self.evaluate().await.map(|(items, _total)| items)
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails or the scope forbids it.
    pub async fn first(self) -> Result<Option<E>, PersistenceError> {
        Ok(self.limit(1).fetch().await?.into_iter().next())
    }

    /// Matching rows, ignoring skip and limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails or the scope forbids it.
    pub async fn count(self) -> Result<usize, PersistenceError> {
        self.evaluate().await.map(|(_items, total)| total)
    }

    /// # Errors
    ///
    /// Returns an error if the store read fails or the scope forbids it.
    pub async fn exists(self) -> Result<bool, PersistenceError> {
        Ok(self.count().await? > 0)
    }

    /// The requested window of results and the total number of matches.
    pub(crate) async fn evaluate(self) -> Result<(Vec<E>, usize), PersistenceError> {
        let Self {
            uow,
            registration,
            mode,
            lookup,
            predicates,
            search,
            sort,
            skip,
            limit,
        } = self;

        let rows = uow.load_rows(registration, &lookup, mode).await?;

        let mut matched = Vec::with_capacity(rows.len());

        for row in rows {
            if let Some(needle) = &search
                && !matches_search(&row.data, registration.search_fields, needle)
            {
                continue;
            }

            let entity: E = serde_json::from_value(row.data.clone())?;

            if predicates.iter().all(|predicate| predicate(&entity)) {
                matched.push((row.data, entity));
            }
        }

        // Stable, so ties keep the store's newest-first order.
        if let Some(sort) = &sort {
            matched.sort_by(|(a, _), (b, _)| {
                let ordering = compare_field(a, b, &sort.field);

                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let total = matched.len();

        let items = matched
            .into_iter()
            .skip(skip)
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_document, entity)| entity)
            .collect();

        Ok((items, total))
    }
}
