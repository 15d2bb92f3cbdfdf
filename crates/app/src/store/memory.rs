//! In-process store.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::tenants::TenantUuid;

use super::{
    EntityStore, Row, RowChange, RowFilter, StoreError, StoreSession, document_version, sort_rows,
};

type RowKey = (String, Uuid);
type Rows = BTreeMap<RowKey, Row>;

/// Keeps rows in a shared map. Cloning shares the underlying rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    rows: Arc<RwLock<Rows>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every committed row of `kind`, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the row map lock is poisoned.
    pub fn snapshot(&self, kind: &str) -> Result<Vec<Row>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_poisoned| StoreError::Unavailable("row lock poisoned"))?;

        let mut matching: Vec<Row> = rows
            .values()
            .filter(|row| row.kind == kind)
            .cloned()
            .collect();

        sort_rows(&mut matching);

        Ok(matching)
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn open_session(
        &self,
        _tenant: Option<TenantUuid>,
    ) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(MemorySession {
            rows: Arc::clone(&self.rows),
            pending: None,
        }))
    }
}

/// A session over [`MemoryStore`]. Inside a transaction, writes are validated
/// immediately but only published on commit.
#[derive(Debug)]
struct MemorySession {
    rows: Arc<RwLock<Rows>>,
    pending: Option<Vec<RowChange>>,
}

impl MemorySession {
    fn committed(&self) -> Result<Rows, StoreError> {
        self.rows
            .read()
            .map(|rows| rows.clone())
            .map_err(|_poisoned| StoreError::Unavailable("row lock poisoned"))
    }

    /// Committed rows with this session's uncommitted changes layered on top.
    fn visible(&self) -> Result<Rows, StoreError> {
        let mut rows = self.committed()?;

        if let Some(pending) = &self.pending {
            apply_changes(&mut rows, pending.iter().cloned())?;
        }

        Ok(rows)
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn fetch(&mut self, kind: &str, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        let rows = self.visible()?;

        let mut matching: Vec<Row> = rows
            .into_values()
            .filter(|row| row.kind == kind && filter.matches(row))
            .collect();

        sort_rows(&mut matching);

        Ok(matching)
    }

    async fn write(&mut self, changes: Vec<RowChange>) -> Result<(), StoreError> {
        if self.pending.is_some() {
            let mut rows = self.visible()?;

            apply_changes(&mut rows, changes.iter().cloned())?;

            if let Some(pending) = self.pending.as_mut() {
                pending.extend(changes);
            }

            return Ok(());
        }

        let mut rows = self
            .rows
            .write()
            .map_err(|_poisoned| StoreError::Unavailable("row lock poisoned"))?;

        let mut next = rows.clone();

        apply_changes(&mut next, changes)?;

        *rows = next;

        Ok(())
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        if self.pending.is_some() {
            return Err(StoreError::TransactionOpen);
        }

        self.pending = Some(Vec::new());

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let pending = self.pending.take().ok_or(StoreError::NoTransaction)?;

        let mut rows = self
            .rows
            .write()
            .map_err(|_poisoned| StoreError::Unavailable("row lock poisoned"))?;

        let mut next = rows.clone();

        apply_changes(&mut next, pending)?;

        *rows = next;

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.pending.take().map(|_discarded| ()).ok_or(StoreError::NoTransaction)
    }

    fn in_transaction(&self) -> bool {
        self.pending.is_some()
    }
}

fn apply_changes(
    rows: &mut Rows,
    changes: impl IntoIterator<Item = RowChange>,
) -> Result<(), StoreError> {
    for change in changes {
        match change {
            RowChange::Insert(row) => {
                let key = (row.kind.clone(), row.uuid);

                if rows.contains_key(&key) {
                    return Err(StoreError::Conflict {
                        kind: row.kind,
                        uuid: row.uuid,
                    });
                }

                rows.insert(key, row);
            }
            RowChange::Update {
                row,
                expected_version,
            } => {
                let key = (row.kind.clone(), row.uuid);

                let Some(existing) = rows.get_mut(&key) else {
                    return Err(StoreError::Missing {
                        kind: row.kind,
                        uuid: row.uuid,
                    });
                };

                if expected_version
                    .is_some_and(|version| version != document_version(&existing.data))
                {
                    return Err(StoreError::Stale {
                        kind: row.kind,
                        uuid: row.uuid,
                    });
                }

                *existing = row;
            }
            RowChange::Delete { kind, uuid } => {
                if rows.remove(&(kind.clone(), uuid)).is_none() {
                    return Err(StoreError::Missing { kind, uuid });
                }
            }
        }
    }

    Ok(())
}
