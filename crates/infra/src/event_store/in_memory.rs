use std::collections::HashMap;
use std::sync::RwLock;

use aura_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent, validate_batch};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Inner {
    streams: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Commit-ordered log across all streams.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store for tests and single-process dev runs.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        validate_batch(&events)?;
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        let key = StreamKey {
            tenant_id: first.tenant_id,
            aggregate_id: first.aggregate_id,
        };
        let aggregate_type = first.aggregate_type.clone();

        let mut inner = self
            .inner
            .write()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        let Inner { streams, log } = &mut *inner;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            log.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            tenant_id,
            aggregate_id,
        };
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(inner.streams.get(&key).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let inner = self
            .inner
            .read()
            .map_err(|_| EventStoreError::Backend("lock poisoned".to_string()))?;
        Ok(inner.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId, ty: &str) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: ty.to_string(),
            event_type: format!("{ty}.happened"),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn sequence_numbers_are_per_stream() {
        let store = InMemoryEventStore::new();
        let t = TenantId::new();
        let a = AggregateId::new();
        let b = AggregateId::new();

        store
            .append(vec![event(t, a, "x"), event(t, a, "x")], ExpectedVersion::Exact(0))
            .unwrap();
        let committed = store.append(vec![event(t, b, "x")], ExpectedVersion::Exact(0)).unwrap();
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(store.load_stream(t, a).unwrap().len(), 2);
        assert_eq!(store.load_all().unwrap().len(), 3);
    }

    #[test]
    fn stale_writer_is_rejected() {
        let store = InMemoryEventStore::new();
        let t = TenantId::new();
        let a = AggregateId::new();
        store.append(vec![event(t, a, "x")], ExpectedVersion::Exact(0)).unwrap();
        let err = store.append(vec![event(t, a, "x")], ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let t1 = TenantId::new();
        store.append(vec![event(t1, a, "x")], ExpectedVersion::Any).unwrap();
        assert!(store.load_stream(TenantId::new(), a).unwrap().is_empty());
    }

    #[test]
    fn mixed_batches_are_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append(
                vec![event(TenantId::new(), a, "x"), event(TenantId::new(), a, "x")],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));

        let t = TenantId::new();
        store.append(vec![event(t, a, "x")], ExpectedVersion::Any).unwrap();
        let err = store.append(vec![event(t, a, "y")], ExpectedVersion::Any).unwrap_err();
        assert!(matches!(err, EventStoreError::AggregateTypeMismatch(_)));
    }
}
