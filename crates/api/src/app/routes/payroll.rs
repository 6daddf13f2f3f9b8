//! Payroll runs and the payslip lifecycle (draft, approved, paid).

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    response::Response,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};

use aura_auth::permissions;
use aura_core::{AggregateId, TenantId};
use aura_infra::projections::{EmployeeReadModel, PayrollFilter, PayslipReadModel, aggregate_types};
use aura_payroll::{
    ApprovePayslip, GeneratePayslip, MarkPayslipPaid, PayPeriod, Payslip, PayslipCommand, RecalculatePayslip,
};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, employee_or_404, items, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_payslips))
        .route("/generate", post(generate_payroll))
        .route("/:id", get(get_payslip))
        .route("/:id/recalculate", post(recalculate_payslip))
        .route("/:id/approve", post(approve_payslip))
        .route("/:id/pay", post(pay_payslip))
}

fn dispatch_payslip(services: &AppServices, tenant_id: TenantId, payslip_id: AggregateId, command: PayslipCommand) -> Result<(), Response> {
    committed(services.dispatch::<Payslip>(
        tenant_id,
        payslip_id,
        aggregate_types::PAYSLIP,
        command,
        |_, id| Payslip::empty(id),
    ))?;
    Ok(())
}

fn payslip_or_404(services: &AppServices, tenant_id: TenantId, payslip_id: AggregateId) -> Result<PayslipReadModel, Response> {
    services
        .projections()
        .payroll
        .get(tenant_id, payslip_id)
        .ok_or_else(|| errors::not_found("payslip"))
}

fn period_bounds(period: PayPeriod) -> Result<(NaiveDate, NaiveDate), Response> {
    match (period.first_day(), period.last_day()) {
        (Some(first), Some(last)) => Ok((first, last)),
        _ => Err(errors::bad_request(format!("invalid pay period {period}"))),
    }
}

/// Why an employee gets no payslip for `period`, if anything.
fn ineligible(employee: &EmployeeReadModel, first: NaiveDate, last: NaiveDate) -> Option<&'static str> {
    if employee.hire_date > last {
        return Some("hired after the period");
    }
    match employee.termination_date {
        Some(ended) if ended < first => Some("terminated before the period"),
        _ => None,
    }
}

/// Draft a payslip for every eligible employee of the period.
///
/// Base salary comes from the directory, unpaid days from approved unpaid
/// leave, working days from tenant settings. Employees that already have a
/// payslip for the period are reported as skipped.
pub async fn generate_payroll(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::GeneratePayrollRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::PAYROLL_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let period = dto::parse_period(&body.period)?;
    let (first, last) = period_bounds(period)?;
    let working_days = services.settings_for(tenant_id).working_days_per_month;
    let projections = services.projections();

    let employees: Vec<EmployeeReadModel> = match &body.employee_ids {
        Some(ids) => ids
            .iter()
            .map(|id| employee_or_404(&services, tenant_id, *id))
            .collect::<Result<_, _>>()?,
        None => projections.employees.list(tenant_id),
    };
    let single = body.employee_ids.as_ref().is_some_and(|ids| ids.len() == 1);

    let mut generated = Vec::new();
    let mut skipped = Vec::new();
    for employee in employees {
        if let Some(reason) = ineligible(&employee, first, last) {
            if single {
                return Err(errors::unprocessable(format!("{}: {reason}", employee.employee_code)));
            }
            skipped.push(json!({ "employee_id": employee.employee_id, "reason": reason }));
            continue;
        }

        let payslip_id = Payslip::payslip_id(tenant_id, employee.employee_id, period);
        let unpaid = projections
            .leave
            .unpaid_days_between(tenant_id, employee.employee_id, first, last);
        let result = dispatch_payslip(
            &services,
            tenant_id,
            payslip_id,
            PayslipCommand::Generate(GeneratePayslip {
                tenant_id,
                employee_id: employee.employee_id,
                period,
                base_salary: employee.base_salary,
                allowances: body.allowances.clone(),
                deductions: body.deductions.clone(),
                unpaid_leave_days: unpaid,
                working_days,
                occurred_at: Utc::now(),
            }),
        );
        match result {
            Ok(()) => generated.push(payslip_or_404(&services, tenant_id, payslip_id)?),
            Err(response) if single => return Err(response),
            Err(response) => {
                warn!(
                    tenant_id = %tenant_id,
                    employee_id = %employee.employee_id,
                    status = %response.status(),
                    "payslip not generated"
                );
                skipped.push(json!({
                    "employee_id": employee.employee_id,
                    "reason": format!("rejected with status {}", response.status().as_u16()),
                }));
            }
        }
    }

    info!(tenant_id = %tenant_id, period = %period, generated = generated.len(), skipped = skipped.len(), "payroll generated");
    Ok(ok(json!({
        "period": period,
        "generated": generated,
        "skipped": skipped,
    })))
}

/// Recompute a draft with the latest salary, leave and settings, applying
/// any explicit overrides from the body.
pub async fn recalculate_payslip(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::RecalculatePayslipRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::PAYROLL_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let payslip_id = dto::parse_id(&id, "payslip")?;
    let payslip = payslip_or_404(&services, tenant_id, payslip_id)?;
    let employee = employee_or_404(&services, tenant_id, payslip.employee_id)?;
    let (first, last) = period_bounds(payslip.period)?;
    let Json(body) = body.unwrap_or_default();

    let unpaid = services
        .projections()
        .leave
        .unpaid_days_between(tenant_id, payslip.employee_id, first, last);
    dispatch_payslip(
        &services,
        tenant_id,
        payslip_id,
        PayslipCommand::Recalculate(RecalculatePayslip {
            tenant_id,
            base_salary: Some(body.base_salary.unwrap_or(employee.base_salary)),
            allowances: body.allowances,
            deductions: body.deductions,
            unpaid_leave_days: Some(unpaid),
            working_days: Some(services.settings_for(tenant_id).working_days_per_month),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(payslip_or_404(&services, tenant_id, payslip_id)?))
}

pub async fn approve_payslip(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::PAYROLL_APPROVE)?;
    let tenant_id = tenant.tenant_id();
    let payslip_id = dto::parse_id(&id, "payslip")?;
    payslip_or_404(&services, tenant_id, payslip_id)?;

    dispatch_payslip(
        &services,
        tenant_id,
        payslip_id,
        PayslipCommand::Approve(ApprovePayslip {
            tenant_id,
            approved_by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(payslip_or_404(&services, tenant_id, payslip_id)?))
}

pub async fn pay_payslip(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::PayPayslipRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::PAYROLL_APPROVE)?;
    let tenant_id = tenant.tenant_id();
    let payslip_id = dto::parse_id(&id, "payslip")?;
    payslip_or_404(&services, tenant_id, payslip_id)?;
    let Json(body) = body.unwrap_or_default();

    let now = Utc::now();
    dispatch_payslip(
        &services,
        tenant_id,
        payslip_id,
        PayslipCommand::MarkPaid(MarkPayslipPaid {
            tenant_id,
            paid_on: body.paid_on.unwrap_or_else(|| now.date_naive()),
            reference: body.reference,
            occurred_at: now,
        }),
    )?;
    Ok(ok(payslip_or_404(&services, tenant_id, payslip_id)?))
}

pub async fn list_payslips(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::PayrollQuery>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::PAYROLL_READ, &permissions::ESS_PAYSLIPS)?;
    let filter = PayrollFilter {
        period: query.period.as_deref().map(dto::parse_period).transpose()?,
        employee_id: scope.filter(query.employee_id)?,
    };
    Ok(items(services.projections().payroll.list(tenant.tenant_id(), &filter)))
}

pub async fn get_payslip(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::PAYROLL_READ, &permissions::ESS_PAYSLIPS)?;
    let payslip = payslip_or_404(&services, tenant.tenant_id(), dto::parse_id(&id, "payslip")?)?;
    if !scope.allows(payslip.employee_id) {
        return Err(errors::not_found("payslip"));
    }
    Ok(ok(payslip))
}
