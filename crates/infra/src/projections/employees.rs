//! Employee directory per tenant.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::{AggregateId, Money, TenantId, UserId};
use aura_employees::{EmployeeEvent, EmployeeStatus};
use aura_events::EventEnvelope;

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeReadModel {
    pub employee_id: AggregateId,
    pub employee_code: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
    pub designation: String,
    pub hire_date: NaiveDate,
    pub base_salary: Money,
    pub status: EmployeeStatus,
    pub termination_date: Option<NaiveDate>,
    pub user_id: Option<UserId>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeReadModel {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active
    }
}

#[derive(Debug)]
pub struct EmployeesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> EmployeesProjection<S>
where
    S: TenantStore<AggregateId, EmployeeReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, employee_id: AggregateId) -> Option<EmployeeReadModel> {
        self.store.get(tenant_id, &employee_id)
    }

    /// Codes are compared case-insensitively.
    pub fn get_by_code(&self, tenant_id: TenantId, code: &str) -> Option<EmployeeReadModel> {
        let code = code.trim();
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|e| e.employee_code.eq_ignore_ascii_case(code))
    }

    /// Sorted by employee code.
    pub fn list(&self, tenant_id: TenantId) -> Vec<EmployeeReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.employee_code.cmp(&b.employee_code));
        rows
    }

    pub fn active_count(&self, tenant_id: TenantId) -> usize {
        self.store.list(tenant_id).iter().filter(|e| e.is_active()).count()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::EMPLOYEE {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: EmployeeEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        match event {
            EmployeeEvent::Hired(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.employee_id,
                    EmployeeReadModel {
                        employee_id: e.employee_id,
                        employee_code: e.employee_code,
                        first_name: e.profile.first_name,
                        last_name: e.profile.last_name,
                        email: e.profile.email,
                        department: e.profile.department,
                        designation: e.profile.designation,
                        hire_date: e.hire_date,
                        base_salary: e.base_salary,
                        status: EmployeeStatus::Active,
                        termination_date: None,
                        user_id: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            EmployeeEvent::Updated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.employee_id, e.occurred_at, |row| {
                    row.first_name = e.profile.first_name;
                    row.last_name = e.profile.last_name;
                    row.email = e.profile.email;
                    row.department = e.profile.department;
                    row.designation = e.profile.designation;
                });
            }
            EmployeeEvent::SalaryChanged(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.employee_id, e.occurred_at, |row| row.base_salary = e.base_salary);
            }
            EmployeeEvent::UserLinked(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.employee_id, e.occurred_at, |row| row.user_id = Some(e.user_id));
            }
            EmployeeEvent::Terminated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.employee_id, e.occurred_at, |row| {
                    row.status = EmployeeStatus::Terminated;
                    row.termination_date = Some(e.termination_date);
                });
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(
        &self,
        tenant_id: TenantId,
        employee_id: AggregateId,
        at: DateTime<Utc>,
        f: impl FnOnce(&mut EmployeeReadModel),
    ) {
        if let Some(mut row) = self.store.get(tenant_id, &employee_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, employee_id, row);
        }
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
