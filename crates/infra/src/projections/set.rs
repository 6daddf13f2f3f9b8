//! All read models of the service, fed from one place.

use std::sync::{Arc, Mutex};

use serde_json::Value as JsonValue;
use tracing::{info, warn};
use uuid::Uuid;

use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;

use super::{
    AttendanceProjection, AttendanceReadModel, EmployeeReadModel, EmployeesProjection,
    LeaveProjection, LeaveReadModel, NotificationReadModel, NotificationsProjection,
    PayrollProjection, PayslipReadModel, ProjectionError, SettingsProjection, SettingsReadModel,
    TenantReadModel, TenantsProjection, TicketReadModel, TicketsProjection, UserReadModel,
    UsersProjection,
};
use crate::event_store::StoredEvent;
use crate::read_model::InMemoryTenantStore;

type Store<K, V> = Arc<InMemoryTenantStore<K, V>>;

/// In-memory projections for every aggregate type.
///
/// `apply` is serialised behind a mutex: the bus worker and the request path
/// (read-your-writes) may both deliver the same envelope, and the per-stream
/// cursors turn the second delivery into a no-op.
#[derive(Debug)]
pub struct ProjectionSet {
    pub tenants: TenantsProjection<Store<TenantId, TenantReadModel>>,
    pub users: UsersProjection<Store<UserId, UserReadModel>>,
    pub employees: EmployeesProjection<Store<AggregateId, EmployeeReadModel>>,
    pub attendance: AttendanceProjection<Store<AggregateId, AttendanceReadModel>>,
    pub leave: LeaveProjection<Store<AggregateId, LeaveReadModel>>,
    pub payroll: PayrollProjection<Store<AggregateId, PayslipReadModel>>,
    pub settings: SettingsProjection<Store<AggregateId, SettingsReadModel>>,
    pub tickets: TicketsProjection<Store<AggregateId, TicketReadModel>>,
    pub notifications: NotificationsProjection<Store<Uuid, NotificationReadModel>>,
    apply_lock: Mutex<()>,
}

impl Default for ProjectionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectionSet {
    pub fn new() -> Self {
        Self {
            tenants: TenantsProjection::new(Arc::default()),
            users: UsersProjection::new(Arc::default()),
            employees: EmployeesProjection::new(Arc::default()),
            attendance: AttendanceProjection::new(Arc::default()),
            leave: LeaveProjection::new(Arc::default()),
            payroll: PayrollProjection::new(Arc::default()),
            settings: SettingsProjection::new(Arc::default()),
            tickets: TicketsProjection::new(Arc::default()),
            notifications: NotificationsProjection::new(Arc::default()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Route one envelope to every projection interested in its aggregate type.
    pub fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let _guard = self.apply_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        self.tenants.apply_envelope(envelope)?;
        self.users.apply_envelope(envelope)?;
        self.employees.apply_envelope(envelope)?;
        self.attendance.apply_envelope(envelope)?;
        self.leave.apply_envelope(envelope)?;
        self.payroll.apply_envelope(envelope)?;
        self.settings.apply_envelope(envelope)?;
        self.tickets.apply_envelope(envelope)?;
        self.notifications
            .apply_envelope(envelope, |tenant| self.settings.toggles(tenant))?;
        Ok(())
    }

    /// Apply and log instead of failing; used by the bus worker.
    pub fn apply_logged(&self, envelope: &EventEnvelope<JsonValue>) {
        if let Err(err) = self.apply(envelope) {
            warn!(
                tenant_id = %envelope.tenant_id(),
                aggregate_type = envelope.aggregate_type(),
                sequence_number = envelope.sequence_number(),
                error = %err,
                "projection apply failed"
            );
        }
    }

    pub fn apply_committed(&self, committed: &[StoredEvent]) {
        for stored in committed {
            self.apply_logged(&stored.to_envelope());
        }
    }

    /// Drop every read model and replay `events` in commit order.
    pub fn rebuild(&self, events: &[StoredEvent]) -> Result<usize, ProjectionError> {
        let mut tenants: Vec<TenantId> = events.iter().map(|e| e.tenant_id).collect();
        for e in events {
            // Announcements write into the announced tenant, not the stream's tenant.
            if e.tenant_id.is_system() {
                tenants.push(TenantId::from_uuid(*e.aggregate_id.as_uuid()));
            }
        }
        tenants.sort();
        tenants.dedup();

        self.tenants.reset();
        self.users.reset(&tenants);
        self.employees.reset(&tenants);
        self.attendance.reset(&tenants);
        self.leave.reset(&tenants);
        self.payroll.reset(&tenants);
        self.settings.reset(&tenants);
        self.tickets.reset(&tenants);
        self.notifications.reset(&tenants);

        for stored in events {
            self.apply(&stored.to_envelope())?;
        }
        info!(events = events.len(), tenants = tenants.len(), "read models rebuilt");
        Ok(events.len())
    }
}
