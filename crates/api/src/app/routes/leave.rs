//! Leave requests: submission, review, cancellation and balances.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    response::Response,
    routing::{get, post},
};
use chrono::{Datelike, NaiveDate, Utc};
use serde_json::json;
use tracing::info;

use aura_auth::permissions;
use aura_core::{AggregateId, TenantId};
use aura_infra::projections::{LeaveFilter, LeaveReadModel, aggregate_types};
use aura_leave::{
    ApproveLeave, CancelLeave, LeaveCommand, LeaveRequest, LeaveStatus, LeaveType, RejectLeave, SubmitLeave,
    business_days, business_days_in_year,
};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, created, employee_or_404, items, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(submit_leave).get(list_leave))
        .route("/balance", get(leave_balance))
        .route("/:id", get(get_leave))
        .route("/:id/approve", post(approve_leave))
        .route("/:id/reject", post(reject_leave))
        .route("/:id/cancel", post(cancel_leave))
}

fn dispatch_leave(services: &AppServices, tenant_id: TenantId, request_id: AggregateId, command: LeaveCommand) -> Result<(), Response> {
    committed(services.dispatch::<LeaveRequest>(
        tenant_id,
        request_id,
        aggregate_types::LEAVE,
        command,
        |_, id| LeaveRequest::empty(id),
    ))?;
    Ok(())
}

fn request_or_404(services: &AppServices, tenant_id: TenantId, request_id: AggregateId) -> Result<LeaveReadModel, Response> {
    services
        .projections()
        .leave
        .get(tenant_id, request_id)
        .ok_or_else(|| errors::not_found("leave request"))
}

/// Allowance-bearing leave must fit in what is left after approved and
/// pending requests of the same year.
fn ensure_allowance(
    services: &AppServices,
    tenant_id: TenantId,
    employee_id: AggregateId,
    leave_type: LeaveType,
    start: NaiveDate,
    end: NaiveDate,
    already_pending: bool,
) -> Result<(), Response> {
    if !leave_type.uses_allowance() {
        return Ok(());
    }
    let allowance = services.settings_for(tenant_id).annual_leave_days;
    // Each calendar year's allowance covers only that year's days.
    for year in start.year()..=end.year() {
        let days = business_days_in_year(start, end, year);
        if days == 0 {
            continue;
        }
        let balance = services
            .projections()
            .leave
            .balance(tenant_id, employee_id, year, allowance);
        let mut held = i64::from(balance.pending);
        if already_pending {
            held -= i64::from(days);
        }
        let available = balance.remaining - held;
        if i64::from(days) > available {
            return Err(errors::unprocessable(format!(
                "insufficient {year} leave balance: {days} day(s) requested, {} available",
                available.max(0)
            )));
        }
    }
    Ok(())
}

pub async fn submit_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::SubmitLeaveRequest>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::LEAVE_WRITE, &permissions::ESS_LEAVE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = scope.target(body.employee_id)?;

    let employee = employee_or_404(&services, tenant_id, employee_id)?;
    if !employee.is_active() {
        return Err(errors::unprocessable("leave cannot be requested for a terminated employee"));
    }
    if body.end < body.start {
        return Err(errors::bad_request("leave end date precedes start date"));
    }
    let clashes = services
        .projections()
        .leave
        .overlapping(tenant_id, employee_id, body.start, body.end);
    if let Some(clash) = clashes.first() {
        return Err(errors::conflict(format!(
            "overlaps {} leave {}..{}",
            clash.status.as_str(),
            clash.start,
            clash.end
        )));
    }

    let days = business_days(body.start, body.end);
    ensure_allowance(&services, tenant_id, employee_id, body.leave_type, body.start, body.end, false)?;

    let request_id = AggregateId::new();

    dispatch_leave(
        &services,
        tenant_id,
        request_id,
        LeaveCommand::Submit(SubmitLeave {
            tenant_id,
            request_id,
            employee_id,
            leave_type: body.leave_type,
            start: body.start,
            end: body.end,
            reason: body.reason,
            occurred_at: Utc::now(),
        }),
    )?;
    info!(tenant_id = %tenant_id, request_id = %request_id, days, "leave submitted");
    Ok(created(request_or_404(&services, tenant_id, request_id)?))
}

pub async fn approve_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReviewRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::LEAVE_APPROVE)?;
    let tenant_id = tenant.tenant_id();
    let request_id = dto::parse_id(&id, "leave request")?;
    let request = request_or_404(&services, tenant_id, request_id)?;
    if request.status == LeaveStatus::Pending {
        ensure_allowance(
            &services,
            tenant_id,
            request.employee_id,
            request.leave_type,
            request.start,
            request.end,
            true,
        )?;
    }

    dispatch_leave(
        &services,
        tenant_id,
        request_id,
        LeaveCommand::Approve(ApproveLeave {
            tenant_id,
            request_id,
            reviewer: principal.user_id(),
            note: body.and_then(|Json(b)| b.note),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(request_or_404(&services, tenant_id, request_id)?))
}

pub async fn reject_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReviewRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::LEAVE_APPROVE)?;
    let tenant_id = tenant.tenant_id();
    let request_id = dto::parse_id(&id, "leave request")?;
    request_or_404(&services, tenant_id, request_id)?;

    dispatch_leave(
        &services,
        tenant_id,
        request_id,
        LeaveCommand::Reject(RejectLeave {
            tenant_id,
            request_id,
            reviewer: principal.user_id(),
            note: body.and_then(|Json(b)| b.note),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(request_or_404(&services, tenant_id, request_id)?))
}

pub async fn cancel_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::LEAVE_WRITE, &permissions::ESS_LEAVE)?;
    let tenant_id = tenant.tenant_id();
    let request_id = dto::parse_id(&id, "leave request")?;
    let request = request_or_404(&services, tenant_id, request_id)?;
    if !scope.allows(request.employee_id) {
        return Err(errors::not_found("leave request"));
    }

    let now = Utc::now();
    dispatch_leave(
        &services,
        tenant_id,
        request_id,
        LeaveCommand::Cancel(CancelLeave {
            tenant_id,
            request_id,
            acting_employee: scope.own(),
            today: now.date_naive(),
            occurred_at: now,
        }),
    )?;
    Ok(ok(request_or_404(&services, tenant_id, request_id)?))
}

pub async fn list_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::LeaveQuery>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::LEAVE_READ, &permissions::ESS_LEAVE)?;
    let filter = LeaveFilter {
        employee_id: scope.filter(query.employee_id)?,
        status: query.status,
    };
    Ok(items(services.projections().leave.list(tenant.tenant_id(), &filter)))
}

pub async fn get_leave(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::LEAVE_READ, &permissions::ESS_LEAVE)?;
    let request = request_or_404(&services, tenant.tenant_id(), dto::parse_id(&id, "leave request")?)?;
    if !scope.allows(request.employee_id) {
        return Err(errors::not_found("leave request"));
    }
    Ok(ok(request))
}

pub async fn leave_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::BalanceQuery>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::LEAVE_READ, &permissions::ESS_LEAVE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = scope.target(query.employee_id)?;
    employee_or_404(&services, tenant_id, employee_id)?;

    let year = query.year.unwrap_or_else(|| Utc::now().year());
    let allowance = services.settings_for(tenant_id).annual_leave_days;
    let balance = services.projections().leave.balance(tenant_id, employee_id, year, allowance);
    Ok(ok(json!({ "balance": balance })))
}
