//! Daily attendance rows, filterable by employee and date range.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_attendance::{AttendanceEvent, AttendanceStatus, worked_minutes};
use aura_core::{AggregateId, TenantId};
use aura_events::EventEnvelope;

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceReadModel {
    pub record_id: AggregateId,
    pub employee_id: AggregateId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<DateTime<Utc>>,
    pub check_out: Option<DateTime<Utc>>,
    pub worked_minutes: Option<i64>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttendanceFilter {
    pub employee_id: Option<AggregateId>,
    /// Inclusive.
    pub from: Option<NaiveDate>,
    /// Inclusive.
    pub to: Option<NaiveDate>,
}

impl AttendanceFilter {
    pub fn matches(&self, row: &AttendanceReadModel) -> bool {
        self.employee_id.is_none_or(|e| e == row.employee_id)
            && self.from.is_none_or(|d| row.date >= d)
            && self.to.is_none_or(|d| row.date <= d)
    }
}

#[derive(Debug)]
pub struct AttendanceProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> AttendanceProjection<S>
where
    S: TenantStore<AggregateId, AttendanceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, record_id: AggregateId) -> Option<AttendanceReadModel> {
        self.store.get(tenant_id, &record_id)
    }

    /// Newest day first.
    pub fn list(&self, tenant_id: TenantId, filter: &AttendanceFilter) -> Vec<AttendanceReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(a.employee_id.cmp(&b.employee_id)));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::ATTENDANCE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: AttendanceEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        let record_id = envelope.aggregate_id();
        match event {
            AttendanceEvent::CheckedIn(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut row = self.row(tenant_id, record_id, e.employee_id, e.date, e.occurred_at);
                row.status = AttendanceStatus::Present;
                row.check_in = Some(e.at);
                row.notes = e.notes.or(row.notes);
                self.save(tenant_id, row);
            }
            AttendanceEvent::CheckedOut(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut row = self.row(tenant_id, record_id, e.employee_id, e.date, e.occurred_at);
                row.check_out = Some(e.at);
                self.save(tenant_id, row);
            }
            AttendanceEvent::Marked(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut row = self.row(tenant_id, record_id, e.employee_id, e.date, e.occurred_at);
                row.status = e.status;
                row.notes = e.notes.or(row.notes);
                self.save(tenant_id, row);
            }
            AttendanceEvent::Corrected(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                let mut row = self.row(tenant_id, record_id, e.employee_id, e.date, e.occurred_at);
                row.check_in = e.check_in;
                row.check_out = e.check_out;
                row.notes = e.notes.or(row.notes);
                self.save(tenant_id, row);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn row(
        &self,
        tenant_id: TenantId,
        record_id: AggregateId,
        employee_id: AggregateId,
        date: NaiveDate,
        at: DateTime<Utc>,
    ) -> AttendanceReadModel {
        let mut row = self.store.get(tenant_id, &record_id).unwrap_or(AttendanceReadModel {
            record_id,
            employee_id,
            date,
            status: AttendanceStatus::Present,
            check_in: None,
            check_out: None,
            worked_minutes: None,
            notes: None,
            updated_at: at,
        });
        row.updated_at = at;
        row
    }

    fn save(&self, tenant_id: TenantId, mut row: AttendanceReadModel) {
        row.worked_minutes = worked_minutes(row.check_in, row.check_out);
        self.store.upsert(tenant_id, row.record_id, row);
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
