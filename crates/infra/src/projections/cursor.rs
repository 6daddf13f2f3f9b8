use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use aura_core::{AggregateId, TenantId};
use aura_events::EventEnvelope;

use super::ProjectionError;

/// Last applied sequence number per `(tenant, aggregate)` stream.
///
/// A projection asks [`StreamCursors::should_apply`] before touching its read
/// model and calls [`StreamCursors::advance`] after. Redelivered envelopes
/// (`seq <= cursor`) are skipped; gaps are reported.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<(TenantId, AggregateId), u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|m| m.get(&(tenant_id, aggregate_id)).copied())
            .unwrap_or(0)
    }

    pub fn should_apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let last = self.get(envelope.tenant_id(), envelope.aggregate_id());
        let seq = envelope.sequence_number();
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Ok(mut m) = self.inner.write() {
            m.insert(
                (envelope.tenant_id(), envelope.aggregate_id()),
                envelope.sequence_number(),
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut m) = self.inner.write() {
            m.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn env(tenant: TenantId, agg: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), tenant, agg, "x.y", "x.y.z", seq, Utc::now(), JsonValue::Null)
    }

    #[test]
    fn redelivery_is_skipped_and_gaps_are_reported() {
        let cursors = StreamCursors::new();
        let t = TenantId::new();
        let a = AggregateId::new();

        assert!(cursors.should_apply(&env(t, a, 1)).unwrap());
        cursors.advance(&env(t, a, 1));
        assert!(!cursors.should_apply(&env(t, a, 1)).unwrap());
        assert!(matches!(
            cursors.should_apply(&env(t, a, 3)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 3 })
        ));
        assert!(cursors.should_apply(&env(TenantId::new(), a, 1)).unwrap());
    }

    proptest::proptest! {
        #[test]
        fn any_redelivery_pattern_applies_each_sequence_once(dups in proptest::collection::vec(0usize..3, 1..30)) {
            let cursors = StreamCursors::new();
            let t = TenantId::new();
            let a = AggregateId::new();
            let mut applied = 0u64;
            for (i, extra) in dups.iter().enumerate() {
                let e = env(t, a, i as u64 + 1);
                for _ in 0..=*extra {
                    if cursors.should_apply(&e).unwrap() {
                        cursors.advance(&e);
                        applied += 1;
                    }
                }
            }
            proptest::prop_assert_eq!(applied, dups.len() as u64);
            proptest::prop_assert_eq!(cursors.get(t, a), dups.len() as u64);
        }
    }
}
