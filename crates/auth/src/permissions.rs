use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier (`"<area>.<action>"`, e.g. `"leave.approve"`).
///
/// `"*"` is the wildcard held by system administrators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// Leading segment, used to group permissions in the RBAC registry.
    pub fn area(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const WILDCARD: Permission = Permission::from_static("*");

// Platform
pub const TENANTS_MANAGE: Permission = Permission::from_static("tenants.manage");

// Tenant administration
pub const USERS_READ: Permission = Permission::from_static("users.read");
pub const USERS_WRITE: Permission = Permission::from_static("users.write");
pub const EMPLOYEES_READ: Permission = Permission::from_static("employees.read");
pub const EMPLOYEES_WRITE: Permission = Permission::from_static("employees.write");
pub const ATTENDANCE_READ: Permission = Permission::from_static("attendance.read");
pub const ATTENDANCE_WRITE: Permission = Permission::from_static("attendance.write");
pub const LEAVE_READ: Permission = Permission::from_static("leave.read");
pub const LEAVE_WRITE: Permission = Permission::from_static("leave.write");
pub const LEAVE_APPROVE: Permission = Permission::from_static("leave.approve");
pub const PAYROLL_READ: Permission = Permission::from_static("payroll.read");
pub const PAYROLL_WRITE: Permission = Permission::from_static("payroll.write");
pub const PAYROLL_APPROVE: Permission = Permission::from_static("payroll.approve");
pub const SETTINGS_READ: Permission = Permission::from_static("settings.read");
pub const SETTINGS_WRITE: Permission = Permission::from_static("settings.write");
pub const REPORTS_READ: Permission = Permission::from_static("reports.read");
pub const REPORTS_SCHEDULE: Permission = Permission::from_static("reports.schedule");
pub const TICKETS_READ: Permission = Permission::from_static("tickets.read");
pub const TICKETS_MANAGE: Permission = Permission::from_static("tickets.manage");
pub const NOTIFICATIONS_READ: Permission = Permission::from_static("notifications.read");

// Employee self-service
pub const ESS_PROFILE: Permission = Permission::from_static("ess.profile");
pub const ESS_ATTENDANCE: Permission = Permission::from_static("ess.attendance");
pub const ESS_LEAVE: Permission = Permission::from_static("ess.leave");
pub const ESS_PAYSLIPS: Permission = Permission::from_static("ess.payslips");
pub const ESS_TICKETS: Permission = Permission::from_static("ess.tickets");

/// Every permission a tenant administrator holds.
pub const TENANT_ADMIN_SET: &[Permission] = &[
    USERS_READ,
    USERS_WRITE,
    EMPLOYEES_READ,
    EMPLOYEES_WRITE,
    ATTENDANCE_READ,
    ATTENDANCE_WRITE,
    LEAVE_READ,
    LEAVE_WRITE,
    LEAVE_APPROVE,
    PAYROLL_READ,
    PAYROLL_WRITE,
    PAYROLL_APPROVE,
    SETTINGS_READ,
    SETTINGS_WRITE,
    REPORTS_READ,
    REPORTS_SCHEDULE,
    TICKETS_READ,
    TICKETS_MANAGE,
    NOTIFICATIONS_READ,
    ESS_PROFILE,
    ESS_ATTENDANCE,
    ESS_LEAVE,
    ESS_PAYSLIPS,
    ESS_TICKETS,
];

/// Self-service set.
pub const EMPLOYEE_SET: &[Permission] = &[
    ESS_PROFILE,
    ESS_ATTENDANCE,
    ESS_LEAVE,
    ESS_PAYSLIPS,
    ESS_TICKETS,
    NOTIFICATIONS_READ,
];
