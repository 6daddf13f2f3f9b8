use axum::{Json, http::StatusCode, response::IntoResponse, response::Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use aura_auth::{LinkEmployee, User, UserCommand};
use aura_core::{AggregateId, TenantId, UserId};
use aura_employees::{Employee, EmployeeCommand, LinkUser};
use aura_infra::command_dispatcher::DispatchError;
use aura_infra::event_store::StoredEvent;
use aura_infra::projections::{EmployeeReadModel, aggregate_types};

use crate::app::errors;
use crate::app::services::AppServices;

pub fn ok<T: Serialize>(value: T) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}

pub fn created<T: Serialize>(value: T) -> Response {
    (StatusCode::CREATED, Json(value)).into_response()
}

pub fn items<T: Serialize>(items: Vec<T>) -> Response {
    let count = items.len();
    ok(json!({ "items": items, "count": count }))
}

/// Map a dispatch result into the handler's error channel.
pub fn committed(result: Result<Vec<StoredEvent>, DispatchError>) -> Result<Vec<StoredEvent>, Response> {
    result.map_err(errors::dispatch_error_to_response)
}

pub fn dispatch_user(services: &AppServices, tenant_id: TenantId, user_id: UserId, command: UserCommand) -> Result<(), Response> {
    committed(services.dispatch::<User>(
        tenant_id,
        user_id.into(),
        aggregate_types::USER,
        command,
        |_, id| User::empty(id.into()),
    ))?;
    Ok(())
}

pub fn dispatch_employee(
    services: &AppServices,
    tenant_id: TenantId,
    employee_id: AggregateId,
    command: EmployeeCommand,
) -> Result<(), Response> {
    committed(services.dispatch::<Employee>(
        tenant_id,
        employee_id,
        aggregate_types::EMPLOYEE,
        command,
        |_, id| Employee::empty(id),
    ))?;
    Ok(())
}

pub fn employee_or_404(services: &AppServices, tenant_id: TenantId, employee_id: AggregateId) -> Result<EmployeeReadModel, Response> {
    services
        .projections()
        .employees
        .get(tenant_id, employee_id)
        .ok_or_else(|| errors::not_found("employee"))
}

/// Link a login and an employee record on both streams.
///
/// Each side is one-to-one, so either already pointing elsewhere is a conflict.
pub fn link_user_and_employee(
    services: &AppServices,
    tenant_id: TenantId,
    user_id: UserId,
    employee_id: AggregateId,
) -> Result<(), Response> {
    let projections = services.projections();
    let employee = employee_or_404(services, tenant_id, employee_id)?;
    let user = projections
        .users
        .get(tenant_id, &user_id)
        .ok_or_else(|| errors::not_found("user"))?;

    if let Some(other) = projections.users.get_by_employee(tenant_id, employee_id) {
        if other.user_id != user_id {
            return Err(errors::conflict("employee is already linked to another login"));
        }
    }
    if user.employee_id.is_some_and(|linked| linked != employee_id) {
        return Err(errors::conflict("login is already linked to another employee"));
    }

    let now = Utc::now();
    if employee.user_id != Some(user_id) {
        dispatch_employee(
            services,
            tenant_id,
            employee_id,
            EmployeeCommand::LinkUser(LinkUser {
                tenant_id,
                employee_id,
                user_id,
                occurred_at: now,
            }),
        )?;
    }
    if user.employee_id != Some(employee_id) {
        dispatch_user(
            services,
            tenant_id,
            user_id,
            UserCommand::LinkEmployee(LinkEmployee {
                tenant_id,
                user_id,
                employee_id,
                occurred_at: now,
            }),
        )?;
    }
    Ok(())
}
