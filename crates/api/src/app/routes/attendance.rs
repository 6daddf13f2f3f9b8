//! Daily attendance: clock in/out, manual marks, corrections, listing.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Query,
    response::Response,
    routing::{get, post},
};
use chrono::{Days, NaiveDate, Utc};

use aura_attendance::{AttendanceCommand, AttendanceRecord, CheckIn, CheckOut, CorrectAttendance, MarkAttendance};
use aura_auth::permissions;
use aura_core::{AggregateId, TenantId};
use aura_infra::projections::{AttendanceFilter, aggregate_types};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, employee_or_404, items, ok};
use crate::app::{dto, services::AppServices};
use crate::authz::{self, Scope};
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_attendance))
        .route("/check-in", post(check_in))
        .route("/check-out", post(check_out))
        .route("/mark", post(mark_attendance))
        .route("/correct", post(correct_attendance))
}

fn dispatch_record(
    services: &AppServices,
    tenant_id: TenantId,
    employee_id: AggregateId,
    date: NaiveDate,
    command: AttendanceCommand,
) -> ApiResult {
    let record_id = AttendanceRecord::record_id(tenant_id, employee_id, date);
    committed(services.dispatch::<AttendanceRecord>(
        tenant_id,
        record_id,
        aggregate_types::ATTENDANCE,
        command,
        |_, id| AttendanceRecord::empty(id),
    ))?;
    services
        .projections()
        .attendance
        .get(tenant_id, record_id)
        .map(ok)
        .ok_or_else(|| errors::not_found("attendance record"))
}

/// Attendance is only recorded for current employees.
fn ensure_active(services: &AppServices, tenant_id: TenantId, employee_id: AggregateId) -> Result<(), Response> {
    let employee = employee_or_404(services, tenant_id, employee_id)?;
    if !employee.is_active() {
        return Err(errors::unprocessable("attendance cannot be recorded for a terminated employee"));
    }
    Ok(())
}

/// Self-service always clocks "now"; administrators may backfill a time.
fn clock_time(scope: Scope, requested: Option<chrono::DateTime<Utc>>) -> chrono::DateTime<Utc> {
    match scope {
        Scope::Tenant => requested.unwrap_or_else(Utc::now),
        Scope::Own(_) => Utc::now(),
    }
}

pub async fn check_in(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::ClockRequest>>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::ATTENDANCE_WRITE, &permissions::ESS_ATTENDANCE)?;
    let Json(body) = body.unwrap_or_default();
    let tenant_id = tenant.tenant_id();
    let employee_id = scope.target(body.employee_id)?;
    ensure_active(&services, tenant_id, employee_id)?;

    let at = clock_time(scope, body.at);
    let date = at.date_naive();
    dispatch_record(
        &services,
        tenant_id,
        employee_id,
        date,
        AttendanceCommand::CheckIn(CheckIn {
            tenant_id,
            employee_id,
            date,
            at,
            notes: body.notes,
            occurred_at: Utc::now(),
        }),
    )
}

/// Closes today's record, or yesterday's when a shift ran past midnight.
pub async fn check_out(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    body: Option<Json<dto::ClockRequest>>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::ATTENDANCE_WRITE, &permissions::ESS_ATTENDANCE)?;
    let Json(body) = body.unwrap_or_default();
    let tenant_id = tenant.tenant_id();
    let employee_id = scope.target(body.employee_id)?;
    ensure_active(&services, tenant_id, employee_id)?;

    let at = clock_time(scope, body.at);
    let today = at.date_naive();
    let open_on = |date: NaiveDate| {
        services
            .projections()
            .attendance
            .get(tenant_id, AttendanceRecord::record_id(tenant_id, employee_id, date))
            .is_some_and(|r| r.check_in.is_some() && r.check_out.is_none())
    };
    let date = match today.checked_sub_days(Days::new(1)) {
        Some(yesterday) if !open_on(today) && open_on(yesterday) => yesterday,
        _ => today,
    };

    dispatch_record(
        &services,
        tenant_id,
        employee_id,
        date,
        AttendanceCommand::CheckOut(CheckOut {
            tenant_id,
            employee_id,
            date,
            at,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn mark_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::MarkAttendanceRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::ATTENDANCE_WRITE)?;
    let tenant_id = tenant.tenant_id();
    ensure_active(&services, tenant_id, body.employee_id)?;

    dispatch_record(
        &services,
        tenant_id,
        body.employee_id,
        body.date,
        AttendanceCommand::Mark(MarkAttendance {
            tenant_id,
            employee_id: body.employee_id,
            date: body.date,
            status: body.status,
            notes: body.notes,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn correct_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CorrectAttendanceRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::ATTENDANCE_WRITE)?;
    let tenant_id = tenant.tenant_id();
    ensure_active(&services, tenant_id, body.employee_id)?;

    dispatch_record(
        &services,
        tenant_id,
        body.employee_id,
        body.date,
        AttendanceCommand::Correct(CorrectAttendance {
            tenant_id,
            employee_id: body.employee_id,
            date: body.date,
            check_in: body.check_in,
            check_out: body.check_out,
            notes: body.notes,
            occurred_at: Utc::now(),
        }),
    )
}

pub async fn list_attendance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::AttendanceQuery>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::ATTENDANCE_READ, &permissions::ESS_ATTENDANCE)?;
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(errors::bad_request("'from' must not be after 'to'"));
        }
    }
    let filter = AttendanceFilter {
        employee_id: scope.filter(query.employee_id)?,
        from: query.from,
        to: query.to,
    };
    Ok(items(services.projections().attendance.list(tenant.tenant_id(), &filter)))
}
