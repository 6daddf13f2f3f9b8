//! Read model builders.
//!
//! Every projection here is:
//! - rebuildable from the event log (`ProjectionSet::rebuild`)
//! - tenant-isolated (rows live under the envelope's tenant id)
//! - idempotent for at-least-once delivery (per-stream cursors)

pub mod attendance;
pub mod cursor;
pub mod employees;
pub mod leave;
pub mod notifications;
pub mod payroll;
pub mod set;
pub mod settings;
pub mod tenants;
pub mod tickets;
pub mod users;

use thiserror::Error;

pub use attendance::{AttendanceFilter, AttendanceProjection, AttendanceReadModel};
pub use cursor::StreamCursors;
pub use employees::{EmployeeReadModel, EmployeesProjection};
pub use leave::{LeaveBalance, LeaveFilter, LeaveProjection, LeaveReadModel};
pub use notifications::{NotificationReadModel, NotificationsProjection, Recipient};
pub use payroll::{PayrollFilter, PayrollProjection, PayslipReadModel};
pub use set::ProjectionSet;
pub use settings::{SettingsProjection, SettingsReadModel};
pub use tenants::{TenantReadModel, TenantsProjection};
pub use tickets::{TicketReadModel, TicketsProjection};
pub use users::{UserReadModel, UsersProjection};

/// Aggregate type names written on every stored event.
pub mod aggregate_types {
    pub const TENANT: &str = "tenancy.tenant";
    pub const SETTINGS: &str = "tenancy.settings";
    pub const USER: &str = "auth.user";
    pub const EMPLOYEE: &str = "employees.employee";
    pub const ATTENDANCE: &str = "attendance.record";
    pub const LEAVE: &str = "leave.request";
    pub const PAYSLIP: &str = "payroll.payslip";
    pub const TICKET: &str = "support.ticket";
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize { aggregate_type: String, message: String },

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

pub(crate) fn decode<E: serde::de::DeserializeOwned>(
    envelope: &aura_events::EventEnvelope<serde_json::Value>,
) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn ensure_tenant(
    envelope: &aura_events::EventEnvelope<serde_json::Value>,
    event_tenant: aura_core::TenantId,
) -> Result<(), ProjectionError> {
    if envelope.tenant_id() != event_tenant {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(())
}
