//! Leave requests per tenant plus derived balances.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;
use aura_leave::{LeaveEvent, LeaveStatus, LeaveType, business_days, business_days_in_year, ranges_overlap};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveReadModel {
    pub request_id: AggregateId,
    pub employee_id: AggregateId,
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub days: u32,
    pub reason: Option<String>,
    pub status: LeaveStatus,
    pub reviewer: Option<UserId>,
    pub review_note: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LeaveReadModel {
    /// Pending and approved requests block overlapping submissions.
    pub fn is_live(&self) -> bool {
        matches!(self.status, LeaveStatus::Pending | LeaveStatus::Approved)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveFilter {
    pub employee_id: Option<AggregateId>,
    pub status: Option<LeaveStatus>,
}

/// Allowance usage for one employee and calendar year.
///
/// Only leave types that draw on the allowance (annual, casual) count toward
/// `used` and `pending`; unpaid days are reported separately for payroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub employee_id: AggregateId,
    pub year: i32,
    pub allowance: u32,
    pub used: u32,
    pub pending: u32,
    pub remaining: i64,
    pub unpaid_taken: u32,
}

#[derive(Debug)]
pub struct LeaveProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> LeaveProjection<S>
where
    S: TenantStore<AggregateId, LeaveReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, request_id: AggregateId) -> Option<LeaveReadModel> {
        self.store.get(tenant_id, &request_id)
    }

    /// Newest start date first.
    pub fn list(&self, tenant_id: TenantId, filter: &LeaveFilter) -> Vec<LeaveReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|r| filter.employee_id.is_none_or(|e| e == r.employee_id))
            .filter(|r| filter.status.is_none_or(|s| s == r.status))
            .collect();
        rows.sort_by(|a, b| b.start.cmp(&a.start).then(b.submitted_at.cmp(&a.submitted_at)));
        rows
    }

    /// Pending or approved requests of `employee_id` sharing a day with `start..=end`.
    pub fn overlapping(
        &self,
        tenant_id: TenantId,
        employee_id: AggregateId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<LeaveReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.employee_id == employee_id && r.is_live())
            .filter(|r| ranges_overlap((r.start, r.end), (start, end)))
            .collect()
    }

    /// Days are attributed to the year of the request's start date.
    pub fn balance(&self, tenant_id: TenantId, employee_id: AggregateId, year: i32, allowance: u32) -> LeaveBalance {
        let mut used = 0u32;
        let mut pending = 0u32;
        let mut unpaid_taken = 0u32;
        for r in self.store.list(tenant_id) {
            if r.employee_id != employee_id {
                continue;
            }
            // Requests spanning new year count against each year separately.
            let days = business_days_in_year(r.start, r.end, year);
            if days == 0 {
                continue;
            }
            match (r.status, r.leave_type) {
                (LeaveStatus::Approved, LeaveType::Unpaid) => unpaid_taken += days,
                (LeaveStatus::Approved, t) if t.uses_allowance() => used += days,
                (LeaveStatus::Pending, t) if t.uses_allowance() => pending += days,
                _ => {}
            }
        }
        LeaveBalance {
            employee_id,
            year,
            allowance,
            used,
            pending,
            remaining: i64::from(allowance) - i64::from(used),
            unpaid_taken,
        }
    }

    /// Weekdays of approved unpaid leave falling inside `from..=to`.
    pub fn unpaid_days_between(&self, tenant_id: TenantId, employee_id: AggregateId, from: NaiveDate, to: NaiveDate) -> u32 {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|r| r.employee_id == employee_id)
            .filter(|r| r.status == LeaveStatus::Approved && r.leave_type == LeaveType::Unpaid)
            .filter(|r| ranges_overlap((r.start, r.end), (from, to)))
            .map(|r| business_days(r.start.max(from), r.end.min(to)))
            .sum()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::LEAVE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: LeaveEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        match event {
            LeaveEvent::Submitted(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.request_id,
                    LeaveReadModel {
                        request_id: e.request_id,
                        employee_id: e.employee_id,
                        leave_type: e.leave_type,
                        start: e.start,
                        end: e.end,
                        days: e.days,
                        reason: e.reason,
                        status: LeaveStatus::Pending,
                        reviewer: None,
                        review_note: None,
                        submitted_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            LeaveEvent::Approved(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.request_id, e.occurred_at, |r| {
                    r.status = LeaveStatus::Approved;
                    r.reviewer = Some(e.reviewer);
                    r.review_note = e.note;
                });
            }
            LeaveEvent::Rejected(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.request_id, e.occurred_at, |r| {
                    r.status = LeaveStatus::Rejected;
                    r.reviewer = Some(e.reviewer);
                    r.review_note = e.note;
                });
            }
            LeaveEvent::Cancelled(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.request_id, e.occurred_at, |r| r.status = LeaveStatus::Cancelled);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, request_id: AggregateId, at: DateTime<Utc>, f: impl FnOnce(&mut LeaveReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &request_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, request_id, row);
        }
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryTenantStore;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, m, day).unwrap()
    }

    fn submitted(tenant: TenantId, request: AggregateId, employee: AggregateId, t: LeaveType, s: NaiveDate, e: NaiveDate) -> EventEnvelope<JsonValue> {
        let payload = serde_json::to_value(LeaveEvent::Submitted(aura_leave::LeaveSubmitted {
            tenant_id: tenant,
            request_id: request,
            employee_id: employee,
            leave_type: t,
            start: s,
            end: e,
            days: business_days(s, e),
            reason: None,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        EventEnvelope::new(Uuid::now_v7(), tenant, request, aggregate_types::LEAVE, "leave.request.submitted", 1, Utc::now(), payload)
    }

    fn approved(tenant: TenantId, request: AggregateId, employee: AggregateId, t: LeaveType, s: NaiveDate, e: NaiveDate) -> EventEnvelope<JsonValue> {
        let payload = serde_json::to_value(LeaveEvent::Approved(aura_leave::LeaveApproved {
            tenant_id: tenant,
            request_id: request,
            employee_id: employee,
            leave_type: t,
            start: s,
            end: e,
            days: business_days(s, e),
            reviewer: UserId::new(),
            note: None,
            occurred_at: Utc::now(),
        }))
        .unwrap();
        EventEnvelope::new(Uuid::now_v7(), tenant, request, aggregate_types::LEAVE, "leave.request.approved", 2, Utc::now(), payload)
    }

    #[test]
    fn balance_counts_allowance_types_only() {
        let p = LeaveProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant = TenantId::new();
        let emp = AggregateId::new();

        // Mon 2026-03-02 .. Fri 2026-03-06: five days annual, approved.
        let annual = AggregateId::new();
        p.apply_envelope(&submitted(tenant, annual, emp, LeaveType::Annual, d(3, 2), d(3, 6))).unwrap();
        p.apply_envelope(&approved(tenant, annual, emp, LeaveType::Annual, d(3, 2), d(3, 6))).unwrap();

        // Two days casual, pending.
        let casual = AggregateId::new();
        p.apply_envelope(&submitted(tenant, casual, emp, LeaveType::Casual, d(4, 7), d(4, 8))).unwrap();

        // Sick leave never draws on the allowance.
        let sick = AggregateId::new();
        p.apply_envelope(&submitted(tenant, sick, emp, LeaveType::Sick, d(5, 4), d(5, 4))).unwrap();
        p.apply_envelope(&approved(tenant, sick, emp, LeaveType::Sick, d(5, 4), d(5, 4))).unwrap();

        let b = p.balance(tenant, emp, 2026, 20);
        assert_eq!(b.used, 5);
        assert_eq!(b.pending, 2);
        assert_eq!(b.remaining, 15);
        assert_eq!(p.balance(TenantId::new(), emp, 2026, 20).used, 0);
    }

    #[test]
    fn balance_splits_requests_across_the_year_end() {
        let p = LeaveProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant = TenantId::new();
        let emp = AggregateId::new();
        let req = AggregateId::new();
        // Tue 2026-12-29 .. Fri 2027-01-01: three days in 2026, one in 2027.
        let end = NaiveDate::from_ymd_opt(2027, 1, 1).unwrap();
        p.apply_envelope(&submitted(tenant, req, emp, LeaveType::Annual, d(12, 29), end)).unwrap();
        assert_eq!(p.balance(tenant, emp, 2026, 20).pending, 3);
        p.apply_envelope(&approved(tenant, req, emp, LeaveType::Annual, d(12, 29), end)).unwrap();

        let this_year = p.balance(tenant, emp, 2026, 20);
        assert_eq!(this_year.used, 3);
        assert_eq!(this_year.remaining, 17);
        let next_year = p.balance(tenant, emp, 2027, 20);
        assert_eq!(next_year.used, 1);
        assert_eq!(next_year.remaining, 19);
    }

    #[test]
    fn unpaid_days_are_clipped_to_the_period() {
        let p = LeaveProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant = TenantId::new();
        let emp = AggregateId::new();
        let req = AggregateId::new();
        // Thu 2026-01-29 .. Tue 2026-02-03 spans a month boundary.
        p.apply_envelope(&submitted(tenant, req, emp, LeaveType::Unpaid, d(1, 29), d(2, 3))).unwrap();
        p.apply_envelope(&approved(tenant, req, emp, LeaveType::Unpaid, d(1, 29), d(2, 3))).unwrap();

        assert_eq!(p.unpaid_days_between(tenant, emp, d(2, 1), d(2, 28)), 2);
        assert_eq!(p.unpaid_days_between(tenant, emp, d(1, 1), d(1, 31)), 2);
    }

    #[test]
    fn overlap_ignores_rejected_and_other_employees() {
        let p = LeaveProjection::new(Arc::new(InMemoryTenantStore::new()));
        let tenant = TenantId::new();
        let emp = AggregateId::new();
        let req = AggregateId::new();
        p.apply_envelope(&submitted(tenant, req, emp, LeaveType::Annual, d(6, 1), d(6, 5))).unwrap();

        assert_eq!(p.overlapping(tenant, emp, d(6, 5), d(6, 9)).len(), 1);
        assert!(p.overlapping(tenant, AggregateId::new(), d(6, 5), d(6, 9)).is_empty());
        assert!(p.overlapping(tenant, emp, d(6, 6), d(6, 9)).is_empty());
    }
}
