//! Payslips per tenant.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;
use aura_payroll::{LineItem, PayBreakdown, PayPeriod, PayslipEvent, PayslipStatus};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipReadModel {
    pub payslip_id: AggregateId,
    pub employee_id: AggregateId,
    pub period: PayPeriod,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub breakdown: PayBreakdown,
    pub status: PayslipStatus,
    pub approved_by: Option<UserId>,
    pub paid_on: Option<NaiveDate>,
    pub payment_reference: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayrollFilter {
    pub period: Option<PayPeriod>,
    pub employee_id: Option<AggregateId>,
}

#[derive(Debug)]
pub struct PayrollProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> PayrollProjection<S>
where
    S: TenantStore<AggregateId, PayslipReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, payslip_id: AggregateId) -> Option<PayslipReadModel> {
        self.store.get(tenant_id, &payslip_id)
    }

    /// Latest period first.
    pub fn list(&self, tenant_id: TenantId, filter: &PayrollFilter) -> Vec<PayslipReadModel> {
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| filter.period.is_none_or(|x| x == p.period))
            .filter(|p| filter.employee_id.is_none_or(|e| e == p.employee_id))
            .collect();
        rows.sort_by(|a, b| b.period.cmp(&a.period).then(a.employee_id.cmp(&b.employee_id)));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::PAYSLIP {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: PayslipEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        match event {
            PayslipEvent::Generated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.payslip_id,
                    PayslipReadModel {
                        payslip_id: e.payslip_id,
                        employee_id: e.employee_id,
                        period: e.period,
                        allowances: e.allowances,
                        deductions: e.deductions,
                        breakdown: e.breakdown,
                        status: PayslipStatus::Draft,
                        approved_by: None,
                        paid_on: None,
                        payment_reference: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            PayslipEvent::Recalculated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.payslip_id, e.occurred_at, |p| {
                    p.allowances = e.allowances;
                    p.deductions = e.deductions;
                    p.breakdown = e.breakdown;
                });
            }
            PayslipEvent::Approved(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.payslip_id, e.occurred_at, |p| {
                    p.status = PayslipStatus::Approved;
                    p.approved_by = Some(e.approved_by);
                });
            }
            PayslipEvent::Paid(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.payslip_id, e.occurred_at, |p| {
                    p.status = PayslipStatus::Paid;
                    p.paid_on = Some(e.paid_on);
                    p.payment_reference = e.reference;
                });
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, payslip_id: AggregateId, at: DateTime<Utc>, f: impl FnOnce(&mut PayslipReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &payslip_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, payslip_id, row);
        }
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
