//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the (tenant, aggregate) stream
//!   ↓
//! 2. Rehydrate the aggregate by applying history
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with an exact expected version
//!   ↓
//! 5. Publish committed envelopes on the bus
//! ```
//!
//! Every HR write (hiring, check-in, leave approval, payslip generation, ...)
//! goes through [`CommandDispatcher::dispatch`]. The dispatcher itself does no IO;
//! it composes an [`EventStore`] and an [`EventBus`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use aura_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use aura_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Stale expected version or a domain-level conflict (duplicate natural key).
    #[error("conflict: {0}")]
    Concurrency(String),
    /// Cross-tenant or cross-aggregate stream mixing.
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Historical payload no longer matches the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    /// Publication failed after a successful append. Read models can be rebuilt.
    #[error("publish failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Concurrency(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Reusable command execution engine for event-sourced HR records.
///
/// - Events are appended before they are published; a failed append publishes nothing.
/// - The expected version is the loaded stream head, so two writers racing on
///   the same record (e.g. two approvals of one leave request) yield one
///   success and one [`DispatchError::Concurrency`].
/// - Loaded streams are re-checked for tenant and aggregate ownership even
///   though the store already filters by both.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate at `(tenant_id, aggregate_id)`.
    ///
    /// `make_aggregate` builds the empty aggregate that history is folded into
    /// (e.g. `|_, id| Employee::empty(id)`). Returns the committed events with
    /// their sequence numbers; an empty vec when the command decided nothing.
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: aura_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    tenant_id,
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(
            tenant_id = %tenant_id,
            aggregate_id = %aggregate_id,
            aggregate_type = %aggregate_type,
            count = committed.len(),
            "events committed"
        );

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
