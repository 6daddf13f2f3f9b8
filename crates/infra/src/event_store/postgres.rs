//! Postgres-backed event store.
//!
//! SQLx error mapping:
//!
//! | SQLx error | Postgres code | `EventStoreError` |
//! |---|---|---|
//! | unique violation | `23505` | `Concurrency` (another writer took the sequence number) |
//! | check violation | `23514` | `InvalidAppend` |
//! | anything else | | `Backend` |
//!
//! The [`EventStore`] trait is synchronous; the impl bridges into the async
//! pool with `block_in_place`, so it must run on a multi-threaded tokio runtime.

use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use aura_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, validate_batch};

const SCHEMA: &str = include_str!("../../migrations/0001_events.sql");

#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, EventStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Creates the `events` table and indexes when missing.
    pub async fn migrate(&self) -> Result<(), EventStoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id), err)]
    pub async fn load_stream_async(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            WHERE tenant_id = $1 AND aggregate_id = $2
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_stream", e))?;

        rows.iter().map(row_to_event).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_all_async(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let rows = sqlx::query(
            r#"
            SELECT event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                   event_type, event_version, occurred_at, payload
            FROM events
            ORDER BY global_position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_all", e))?;

        rows.iter().map(row_to_event).collect()
    }

    #[instrument(skip(self, events), fields(event_count = events.len(), expected_version = ?expected_version), err)]
    pub async fn append_async(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate_batch(&events)?;
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };
        let tenant_id = first.tenant_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let (current_version, existing_type) = stream_head(&mut tx, tenant_id, aggregate_id).await?;

        if let Some(existing) = existing_type {
            if existing != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{existing}', attempted append with '{aggregate_type}'"
                )));
            }
        }
        if !expected_version.matches(current_version) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current_version}"
            )));
        }

        let mut committed = Vec::with_capacity(events.len());
        let mut next = current_version + 1;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (
                    event_id, tenant_id, aggregate_id, aggregate_type, sequence_number,
                    event_type, event_version, occurred_at, payload
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(event.event_id)
            .bind(tenant_id.as_uuid())
            .bind(aggregate_id.as_uuid())
            .bind(&aggregate_type)
            .bind(next as i64)
            .bind(&event.event_type)
            .bind(event.event_version as i32)
            .bind(event.occurred_at)
            .bind(&event.payload)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_event", e))?;

            committed.push(StoredEvent {
                event_id: event.event_id,
                tenant_id: event.tenant_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: next,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                payload: event.payload,
            });
            next += 1;
        }

        // Dropping an uncommitted transaction rolls it back, so early returns above are safe.
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(committed)
    }
}

impl EventStore for PostgresEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.append_async(events, expected_version))
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.load_stream_async(tenant_id, aggregate_id))
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        block_on(self.load_all_async())
    }
}

fn block_on<F, T>(fut: F) -> Result<T, EventStoreError>
where
    F: std::future::Future<Output = Result<T, EventStoreError>>,
{
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|e| EventStoreError::Backend(format!("no tokio runtime: {e}")))?;
    tokio::task::block_in_place(|| handle.block_on(fut))
}

async fn stream_head(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    aggregate_id: AggregateId,
) -> Result<(u64, Option<String>), EventStoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(sequence_number), 0) AS current_version,
               MAX(aggregate_type) AS aggregate_type
        FROM events
        WHERE tenant_id = $1 AND aggregate_id = $2
        "#,
    )
    .bind(tenant_id.as_uuid())
    .bind(aggregate_id.as_uuid())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("stream_head", e))?;

    let current: i64 = row
        .try_get("current_version")
        .map_err(|e| EventStoreError::Backend(format!("failed to read current_version: {e}")))?;
    let aggregate_type: Option<String> = row
        .try_get("aggregate_type")
        .map_err(|e| EventStoreError::Backend(format!("failed to read aggregate_type: {e}")))?;

    Ok((current.max(0) as u64, aggregate_type))
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<StoredEvent, EventStoreError> {
    let read = |e: sqlx::Error| EventStoreError::Backend(format!("failed to decode event row: {e}"));
    let tenant: uuid::Uuid = row.try_get("tenant_id").map_err(read)?;
    let aggregate: uuid::Uuid = row.try_get("aggregate_id").map_err(read)?;
    let sequence: i64 = row.try_get("sequence_number").map_err(read)?;
    let version: i32 = row.try_get("event_version").map_err(read)?;

    Ok(StoredEvent {
        event_id: row.try_get("event_id").map_err(read)?,
        tenant_id: TenantId::from_uuid(tenant),
        aggregate_id: AggregateId::from_uuid(aggregate),
        aggregate_type: row.try_get("aggregate_type").map_err(read)?,
        sequence_number: sequence as u64,
        event_type: row.try_get("event_type").map_err(read)?,
        event_version: version as u32,
        occurred_at: row.try_get("occurred_at").map_err(read)?,
        payload: row.try_get("payload").map_err(read)?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Concurrency(msg),
                Some("23514") => EventStoreError::InvalidAppend(msg),
                _ => EventStoreError::Backend(msg),
            }
        }
        other => EventStoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}
