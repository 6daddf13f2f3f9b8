//! Employee directory: hire, edit, salary, termination, login linking.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    routing::{get, post, put},
};
use chrono::Utc;
use tracing::info;

use aura_auth::{SuspendUser, UserCommand, UserStatus, permissions};
use aura_core::AggregateId;
use aura_employees::{ChangeSalary, EmployeeCommand, EmployeeProfile, HireEmployee, TerminateEmployee, UpdateEmployee};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{created, dispatch_employee, dispatch_user, employee_or_404, items, link_user_and_employee, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(hire_employee).get(list_employees))
        .route("/:id", get(get_employee).patch(update_employee))
        .route("/:id/salary", put(change_salary))
        .route("/:id/terminate", post(terminate_employee))
        .route("/:id/link-user", post(link_user))
}

pub async fn hire_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::HireEmployeeRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let projections = services.projections();

    let registry = projections
        .tenants
        .get(tenant_id)
        .ok_or_else(|| errors::not_found("tenant"))?;
    let active = projections.employees.active_count(tenant_id);
    if active >= registry.subscription.seats as usize {
        return Err(errors::unprocessable(format!(
            "subscription seat limit of {} reached",
            registry.subscription.seats
        )));
    }
    if projections.employees.get_by_code(tenant_id, &body.employee_code).is_some() {
        return Err(errors::conflict(format!("employee code '{}' is already in use", body.employee_code)));
    }

    let employee_id = AggregateId::new();
    dispatch_employee(
        &services,
        tenant_id,
        employee_id,
        EmployeeCommand::Hire(HireEmployee {
            tenant_id,
            employee_id,
            employee_code: body.employee_code,
            profile: EmployeeProfile {
                first_name: body.first_name,
                last_name: body.last_name,
                email: body.email,
                department: body.department,
                designation: body.designation,
            },
            hire_date: body.hire_date,
            base_salary: body.base_salary,
            occurred_at: Utc::now(),
        }),
    )?;

    info!(tenant_id = %tenant_id, employee_id = %employee_id, "employee hired");
    Ok(created(employee_or_404(&services, tenant_id, employee_id)?))
}

pub async fn list_employees(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::EmployeeListQuery>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_READ)?;
    let rows = services
        .projections()
        .employees
        .list(tenant.tenant_id())
        .into_iter()
        .filter(|e| match query.status.as_deref() {
            Some("active") => e.is_active(),
            Some("terminated") => !e.is_active(),
            _ => true,
        })
        .filter(|e| {
            query
                .department
                .as_deref()
                .is_none_or(|d| e.department.eq_ignore_ascii_case(d))
        })
        .collect();
    Ok(items(rows))
}

pub async fn get_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let scope = authz::scope(&tenant, &principal, &permissions::EMPLOYEES_READ, &permissions::ESS_PROFILE)?;
    let employee_id = dto::parse_id(&id, "employee")?;
    if !scope.allows(employee_id) {
        return Err(errors::not_found("employee"));
    }
    Ok(ok(employee_or_404(&services, tenant.tenant_id(), employee_id)?))
}

pub async fn update_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateEmployeeRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = dto::parse_id(&id, "employee")?;
    employee_or_404(&services, tenant_id, employee_id)?;

    dispatch_employee(
        &services,
        tenant_id,
        employee_id,
        EmployeeCommand::Update(UpdateEmployee {
            tenant_id,
            employee_id,
            first_name: body.first_name,
            last_name: body.last_name,
            email: body.email,
            department: body.department,
            designation: body.designation,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(employee_or_404(&services, tenant_id, employee_id)?))
}

pub async fn change_salary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeSalaryRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = dto::parse_id(&id, "employee")?;
    employee_or_404(&services, tenant_id, employee_id)?;

    dispatch_employee(
        &services,
        tenant_id,
        employee_id,
        EmployeeCommand::ChangeSalary(ChangeSalary {
            tenant_id,
            employee_id,
            base_salary: body.base_salary,
            effective_from: body.effective_from,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(employee_or_404(&services, tenant_id, employee_id)?))
}

/// Terminate the employee and suspend the linked login, if any.
pub async fn terminate_employee(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::TerminateEmployeeRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = dto::parse_id(&id, "employee")?;
    employee_or_404(&services, tenant_id, employee_id)?;

    let now = Utc::now();
    dispatch_employee(
        &services,
        tenant_id,
        employee_id,
        EmployeeCommand::Terminate(TerminateEmployee {
            tenant_id,
            employee_id,
            termination_date: body.termination_date,
            reason: body.reason,
            occurred_at: now,
        }),
    )?;

    let linked = services.projections().users.get_by_employee(tenant_id, employee_id);
    if let Some(user) = linked.filter(|u| u.status == UserStatus::Active) {
        dispatch_user(
            &services,
            tenant_id,
            user.user_id,
            UserCommand::Suspend(SuspendUser {
                tenant_id,
                user_id: user.user_id,
                reason: "employee terminated".to_string(),
                occurred_at: now,
            }),
        )?;
    }

    info!(tenant_id = %tenant_id, employee_id = %employee_id, "employee terminated");
    Ok(ok(employee_or_404(&services, tenant_id, employee_id)?))
}

pub async fn link_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::LinkUserRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::EMPLOYEES_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let employee_id = dto::parse_id(&id, "employee")?;
    link_user_and_employee(&services, tenant_id, body.user_id, employee_id)?;
    Ok(ok(employee_or_404(&services, tenant_id, employee_id)?))
}
