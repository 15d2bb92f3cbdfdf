//! `PostgreSQL` store over a single `entities` table.

use std::fmt;

use async_trait::async_trait;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use serde_json::Value;
use sqlx::{
    FromRow, PgConnection, Postgres, Row as _, Transaction,
    error::{DatabaseError, ErrorKind},
    postgres::PgRow,
    query, query_as,
    types::Json,
};
use uuid::Uuid;

use crate::{database::Db, domain::tenants::TenantUuid};

use super::{EntityStore, Row, RowChange, RowFilter, StoreError, StoreSession};

const SELECT_ROWS_SQL: &str = include_str!("sql/select_rows.sql");
const INSERT_ROW_SQL: &str = include_str!("sql/insert_row.sql");
const UPDATE_ROW_SQL: &str = include_str!("sql/update_row.sql");
const DELETE_ROW_SQL: &str = include_str!("sql/delete_row.sql");

#[derive(Debug, Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn open_session(
        &self,
        tenant: Option<TenantUuid>,
    ) -> Result<Box<dyn StoreSession>, StoreError> {
        Ok(Box::new(PgSession {
            db: self.db.clone(),
            tenant,
            tx: None,
        }))
    }
}

struct PgSession {
    db: Db,
    tenant: Option<TenantUuid>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl fmt::Debug for PgSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgSession")
            .field("tenant", &self.tenant)
            .field("in_transaction", &self.tx.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn fetch(&mut self, kind: &str, filter: &RowFilter) -> Result<Vec<Row>, StoreError> {
        if let Some(tx) = self.tx.as_mut() {
            return select_rows(tx, kind, filter).await.map_err(StoreError::from);
        }

        let mut tx = self.db.begin_tenant_transaction(self.tenant).await?;
        let rows = select_rows(&mut tx, kind, filter).await?;

        tx.commit().await?;

        Ok(rows)
    }

    async fn write(&mut self, changes: Vec<RowChange>) -> Result<(), StoreError> {
        if let Some(tx) = self.tx.as_mut() {
            return write_changes(tx, changes).await;
        }

        let mut tx = self.db.begin_tenant_transaction(self.tenant).await?;

        write_changes(&mut tx, changes).await?;

        tx.commit().await?;

        Ok(())
    }

    async fn begin(&mut self) -> Result<(), StoreError> {
        if self.tx.is_some() {
            return Err(StoreError::TransactionOpen);
        }

        self.tx = Some(self.db.begin_tenant_transaction(self.tenant).await?);

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::NoTransaction)?;

        tx.commit().await?;

        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::NoTransaction)?;

        tx.rollback().await?;

        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }
}

async fn select_rows(
    conn: &mut PgConnection,
    kind: &str,
    filter: &RowFilter,
) -> Result<Vec<Row>, sqlx::Error> {
    query_as::<Postgres, Row>(SELECT_ROWS_SQL)
        .bind(kind)
        .bind(filter.uuid)
        .bind(filter.tenant.map(TenantUuid::into_uuid))
        .bind(filter.include_deleted)
        .bind((!filter.fields.is_empty()).then_some(Json(&filter.fields)))
        .fetch_all(conn)
        .await
}

async fn write_changes(conn: &mut PgConnection, changes: Vec<RowChange>) -> Result<(), StoreError> {
    for change in changes {
        match change {
            RowChange::Insert(row) => {
                bind_row(query(INSERT_ROW_SQL), &row)
                    .execute(&mut *conn)
                    .await
                    .map_err(|error| classify(error, &row.kind, row.uuid))?;
            }
            RowChange::Update {
                row,
                expected_version,
            } => {
                let result = bind_row(query(UPDATE_ROW_SQL), &row)
                    .bind(expected_version)
                    .execute(&mut *conn)
                    .await
                    .map_err(|error| classify(error, &row.kind, row.uuid))?;

                if result.rows_affected() == 0 {
                    let (kind, uuid) = (row.kind, row.uuid);

                    return Err(if expected_version.is_some() {
                        StoreError::Stale { kind, uuid }
                    } else {
                        StoreError::Missing { kind, uuid }
                    });
                }
            }
            RowChange::Delete { kind, uuid } => {
                let result = query(DELETE_ROW_SQL)
                    .bind(&kind)
                    .bind(uuid)
                    .execute(&mut *conn)
                    .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Missing { kind, uuid });
                }
            }
        }
    }

    Ok(())
}

fn bind_row<'q>(
    statement: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    row: &'q Row,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    statement
        .bind(&row.kind)
        .bind(row.uuid)
        .bind(row.tenant_uuid.map(TenantUuid::into_uuid))
        .bind(row.deleted)
        .bind(SqlxTimestamp::from(row.created_at))
        .bind(Json(&row.data))
}

fn classify(error: sqlx::Error, kind: &str, uuid: Uuid) -> StoreError {
    match error.as_database_error().map(DatabaseError::kind) {
        Some(ErrorKind::UniqueViolation) => StoreError::Conflict {
            kind: kind.to_string(),
            uuid,
        },
        _ => StoreError::Sql(error),
    }
}

impl FromRow<'_, PgRow> for Row {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let created_at: SqlxTimestamp = row.try_get("created_at")?;
        let tenant_uuid: Option<Uuid> = row.try_get("tenant_uuid")?;
        let data: Json<Value> = row.try_get("data")?;

        Ok(Self {
            kind: row.try_get("kind")?,
            uuid: row.try_get("uuid")?,
            tenant_uuid: tenant_uuid.map(TenantUuid::from_uuid),
            deleted: row.try_get("deleted")?,
            created_at: created_at.to_jiff(),
            data: data.0,
        })
    }
}

#[cfg(all(test, feature = "pg-tests"))]
mod tests {
    use jiff::Timestamp;
    use serde_json::json;
    use testresult::TestResult;

    use crate::test::db::TestDb;

    use super::*;

    fn row(tenant: Option<TenantUuid>) -> Row {
        let uuid = Uuid::now_v7();

        Row {
            kind: "trucks".to_string(),
            uuid,
            tenant_uuid: tenant,
            deleted: false,
            created_at: Timestamp::now(),
            data: json!({ "uuid": uuid, "plate": "AB-123" }),
        }
    }

    #[tokio::test]
    async fn round_trips_rows_through_postgres() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));
        let tenant = TenantUuid::new();
        let inserted = row(Some(tenant));

        let mut session = store.open_session(Some(tenant)).await?;
        session.write(vec![RowChange::Insert(inserted.clone())]).await?;

        let rows = session.fetch("trucks", &RowFilter::default()).await?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().map(|row| &row.data), Some(&inserted.data));

        Ok(())
    }

    #[tokio::test]
    async fn duplicate_inserts_conflict() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));
        let inserted = row(None);

        let mut session = store.open_session(None).await?;
        session.write(vec![RowChange::Insert(inserted.clone())]).await?;

        let result = session.write(vec![RowChange::Insert(inserted)]).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn live_trucks_cannot_share_a_plate_within_a_tenant() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));
        let tenant = TenantUuid::new();

        let mut session = store.open_session(None).await?;
        session.write(vec![RowChange::Insert(row(Some(tenant)))]).await?;

        let result = session.write(vec![RowChange::Insert(row(Some(tenant)))]).await;

        assert!(
            matches!(result, Err(StoreError::Conflict { .. })),
            "expected Conflict, got {result:?}"
        );

        let mut retired = row(Some(tenant));
        retired.deleted = true;

        session
            .write(vec![
                RowChange::Insert(row(Some(TenantUuid::new()))),
                RowChange::Insert(retired),
            ])
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn rollback_discards_writes() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));

        let mut session = store.open_session(None).await?;
        session.begin().await?;
        session.write(vec![RowChange::Insert(row(None))]).await?;
        session.rollback().await?;

        let rows = session.fetch("trucks", &RowFilter::default()).await?;

        assert!(rows.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn updating_a_missing_row_reports_missing() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));

        let mut session = store.open_session(None).await?;
        let result = session
            .write(vec![RowChange::Update {
                row: row(None),
                expected_version: None,
            }])
            .await;

        assert!(matches!(result, Err(StoreError::Missing { .. })));

        Ok(())
    }

    #[tokio::test]
    async fn updates_from_an_older_version_are_stale() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));

        let mut stored = row(None);
        stored.data = json!({ "uuid": stored.uuid, "version": 3 });

        let mut session = store.open_session(None).await?;
        session.write(vec![RowChange::Insert(stored.clone())]).await?;

        let result = session
            .write(vec![RowChange::Update {
                row: stored.clone(),
                expected_version: Some(2),
            }])
            .await;

        assert!(
            matches!(result, Err(StoreError::Stale { .. })),
            "expected Stale, got {result:?}"
        );

        session
            .write(vec![RowChange::Update {
                row: stored,
                expected_version: Some(3),
            }])
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn fetch_matches_document_fields() -> TestResult {
        let db = TestDb::new().await;
        let store = PgStore::new(Db::new(db.pool().clone()));

        let mut wanted = row(None);
        wanted.kind = "service_api_keys".to_string();
        wanted.data = json!({ "uuid": wanted.uuid, "key_hash": "abc" });

        let mut other = row(None);
        other.kind = "service_api_keys".to_string();
        other.data = json!({ "uuid": other.uuid, "key_hash": "def" });

        let mut session = store.open_session(None).await?;
        session
            .write(vec![RowChange::Insert(wanted.clone()), RowChange::Insert(other)])
            .await?;

        let rows = session
            .fetch(
                "service_api_keys",
                &RowFilter::default().with_field("key_hash", "abc"),
            )
            .await?;

        assert_eq!(rows.len(), 1);
        assert_eq!(rows.first().map(|row| row.uuid), Some(wanted.uuid));

        Ok(())
    }

    #[tokio::test]
    async fn row_level_security_hides_other_tenants_rows() -> TestResult {
        let db = TestDb::new().await;
        let admin = PgStore::new(Db::new(db.pool().clone()));
        let store = PgStore::new(Db::new(db.app_pool().await));

        let tenant_a = TenantUuid::new();
        let tenant_b = TenantUuid::new();

        admin
            .open_session(None)
            .await?
            .write(vec![
                RowChange::Insert(row(Some(tenant_a))),
                RowChange::Insert(row(Some(tenant_b))),
                RowChange::Insert(row(None)),
            ])
            .await?;

        let rows = store
            .open_session(Some(tenant_a))
            .await?
            .fetch("trucks", &RowFilter::default())
            .await?;

        assert_eq!(rows.len(), 2, "own row plus the global row");
        assert!(rows.iter().all(|row| row.tenant_uuid != Some(tenant_b)));

        Ok(())
    }
}
