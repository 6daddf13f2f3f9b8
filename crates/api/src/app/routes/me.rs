//! Self-service overview for the logged-in employee.

use std::sync::Arc;

use axum::Extension;
use chrono::{Datelike, Days, Utc};
use serde_json::json;

use aura_infra::projections::{AttendanceFilter, LeaveFilter, PayrollFilter};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::ok;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, TenantContext};

const RECENT_ATTENDANCE_DAYS: u64 = 30;
const RECENT_PAYSLIPS: usize = 6;

/// Profile, last month of attendance, leave, balance, recent payslips and
/// the unread notification count. Logins without an employee record get
/// only the account part.
pub async fn me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let tenant_id = tenant.tenant_id();
    let projections = services.projections();
    let user = projections.users.get(tenant_id, &principal.user_id());
    let unread = projections
        .notifications
        .list_for(tenant_id, principal.user_id(), principal.employee_id())
        .iter()
        .filter(|n| !n.is_read_by(principal.user_id()))
        .count();

    let Some(employee_id) = principal.employee_id() else {
        return Ok(ok(json!({ "user": user, "employee": null, "unread_notifications": unread })));
    };
    let employee = projections
        .employees
        .get(tenant_id, employee_id)
        .ok_or_else(|| errors::not_found("employee"))?;

    let today = Utc::now().date_naive();
    let attendance = projections.attendance.list(
        tenant_id,
        &AttendanceFilter {
            employee_id: Some(employee_id),
            from: today.checked_sub_days(Days::new(RECENT_ATTENDANCE_DAYS)),
            to: Some(today),
        },
    );
    let leave = projections.leave.list(
        tenant_id,
        &LeaveFilter {
            employee_id: Some(employee_id),
            status: None,
        },
    );
    let allowance = services.settings_for(tenant_id).annual_leave_days;
    let balance = projections.leave.balance(tenant_id, employee_id, today.year(), allowance);

    let mut payslips = projections.payroll.list(
        tenant_id,
        &PayrollFilter {
            period: None,
            employee_id: Some(employee_id),
        },
    );
    payslips.sort_by(|a, b| b.period.cmp(&a.period));
    payslips.truncate(RECENT_PAYSLIPS);

    Ok(ok(json!({
        "user": user,
        "employee": employee,
        "attendance": attendance,
        "leave": leave,
        "leave_balance": balance,
        "payslips": payslips,
        "unread_notifications": unread,
    })))
}
