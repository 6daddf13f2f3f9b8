use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use aura_core::{AggregateId, ExpectedVersion, TenantId};

/// An event ready to be appended (no sequence number yet).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// captures `event_type`, schema version and `occurred_at` next to the JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its position in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub tenant_id: TenantId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Position in the `(tenant_id, aggregate_id)` stream, starting at 1.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    pub fn to_envelope(&self) -> aura_events::EventEnvelope<JsonValue> {
        aura_events::EventEnvelope::new(
            self.event_id,
            self.tenant_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.event_type.clone(),
            self.sequence_number,
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Infrastructure failures (storage, concurrency, isolation), as opposed to domain errors.
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Append-only, tenant-scoped event store.
///
/// Implementations must:
/// - reject batches that mix tenants, aggregates or aggregate types
/// - check `expected_version` against the current stream version
/// - assign sequence numbers `current + 1, current + 2, ...` with no gaps
/// - persist a batch atomically
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Full stream in sequence order; empty when the aggregate does not exist yet.
    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Every event of every tenant in commit order. Used to rebuild read models at startup.
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(tenant_id, aggregate_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: aura_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| EventStoreError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            tenant_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// Shared batch validation: one tenant, one aggregate, one aggregate type.
pub(crate) fn validate_batch(events: &[UncommittedEvent]) -> Result<(), EventStoreError> {
    let Some(first) = events.first() else {
        return Ok(());
    };
    for (idx, e) in events.iter().enumerate() {
        if e.tenant_id != first.tenant_id {
            return Err(EventStoreError::TenantIsolation(format!(
                "batch contains multiple tenant_ids (index {idx})"
            )));
        }
        if e.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "batch contains multiple aggregate_ids (index {idx})"
            )));
        }
        if e.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::AggregateTypeMismatch(format!(
                "batch contains multiple aggregate_types (index {idx})"
            )));
        }
    }
    Ok(())
}
