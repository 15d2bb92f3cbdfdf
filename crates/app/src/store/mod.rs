//! Row storage underneath the unit of work.
//!
//! Stores know nothing about tenants beyond the `tenant_uuid` column; all
//! isolation rules live in the unit of work and the filter registry.

use std::fmt::Debug;

use async_trait::async_trait;
use jiff::Timestamp;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::tenants::TenantUuid;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A stored entity document plus the columns filters run against.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub kind: String,
    pub uuid: Uuid,
    pub tenant_uuid: Option<TenantUuid>,
    pub deleted: bool,
    pub created_at: Timestamp,
    pub data: Value,
}

/// Column predicates pushed down to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowFilter {
    pub uuid: Option<Uuid>,
    pub tenant: Option<TenantUuid>,
    pub include_deleted: bool,
    /// Top-level document fields that must hold exactly these values.
    pub fields: Map<String, Value>,
}

impl RowFilter {
    #[must_use]
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.uuid.is_none_or(|uuid| row.uuid == uuid)
            && self.tenant.is_none_or(|tenant| row.tenant_uuid == Some(tenant))
            && (self.include_deleted || !row.deleted)
            && self
                .fields
                .iter()
                .all(|(field, value)| row.data.get(field) == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowChange {
    Insert(Row),
    /// Replace a row. With `expected_version`, only if the stored document
    /// is still at that version.
    Update {
        row: Row,
        expected_version: Option<i64>,
    },
    Delete { kind: String, uuid: Uuid },
}

/// The optimistic concurrency version stored in a row's document.
pub(crate) fn document_version(data: &Value) -> i64 {
    data.get("version").and_then(Value::as_i64).unwrap_or(0)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {uuid} already exists")]
    Conflict { kind: String, uuid: Uuid },

    #[error("{kind} {uuid} does not exist")]
    Missing { kind: String, uuid: Uuid },

    #[error("{kind} {uuid} was changed by another writer")]
    Stale { kind: String, uuid: Uuid },

    #[error("a store transaction is already open")]
    TransactionOpen,

    #[error("no store transaction is open")]
    NoTransaction,

    #[error("store is unavailable: {0}")]
    Unavailable(&'static str),

    #[error("database error")]
    Sql(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        Self::Sql(error)
    }
}

/// Opens sessions against some backing storage.
#[async_trait]
pub trait EntityStore: Send + Sync + Debug {
    /// Open a session. `tenant` is handed to the backend for its own
    /// row-level security, when it has any.
    async fn open_session(
        &self,
        tenant: Option<TenantUuid>,
    ) -> Result<Box<dyn StoreSession>, StoreError>;
}

/// One connection-like conversation with the store.
///
/// Outside an explicit transaction each call is atomic on its own. Dropping a
/// session with an open transaction discards it.
#[async_trait]
pub trait StoreSession: Send + Debug {
    /// Rows of `kind` matching `filter`, newest first.
    async fn fetch(&mut self, kind: &str, filter: &RowFilter) -> Result<Vec<Row>, StoreError>;

    /// Apply every change or none of them.
    async fn write(&mut self, changes: Vec<RowChange>) -> Result<(), StoreError>;

    async fn begin(&mut self) -> Result<(), StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;

    fn in_transaction(&self) -> bool;
}

/// Newest first, then by uuid so equal timestamps still order stably.
pub(crate) fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.uuid.cmp(&a.uuid))
    });
}
