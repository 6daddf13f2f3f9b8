//! Tenant user administration and the RBAC catalogue.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    response::Response,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use aura_auth::{
    ActivateUser, AssignRole, AuthzError, CreateUser, Permission, Principal, RbacRegistry, RevokeRole, Role, SuspendUser,
    TenantMembership, UserCommand, effective_permissions, explain_authorization, hash_password, permissions,
};
use aura_core::{TenantId, UserId};
use aura_infra::projections::UserReadModel;

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{created, dispatch_user, items, link_user_and_employee, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/roles", post(assign_role))
        .route("/users/:id/roles/:role", delete(revoke_role))
        .route("/users/:id/suspend", post(suspend_user))
        .route("/users/:id/activate", post(activate_user))
        .route("/users/:id/permissions", get(user_permissions))
        .route("/roles", get(list_roles))
}

fn user_or_404(services: &AppServices, tenant_id: TenantId, user_id: &UserId) -> Result<UserReadModel, Response> {
    services
        .projections()
        .users
        .get(tenant_id, user_id)
        .ok_or_else(|| errors::not_found("user"))
}

/// Only the built-in roles can be granted; `system_admin` only by a system admin.
fn grantable_role(raw: &str, principal: &PrincipalContext) -> Result<Role, Response> {
    let role = Role::new(raw.trim().to_string());
    if !role.is_builtin() {
        return Err(errors::bad_request(format!("unknown role '{raw}'")));
    }
    if role == Role::SYSTEM_ADMIN && !principal.is_system_admin() {
        return Err(authz::forbidden(AuthzError::Forbidden(Role::SYSTEM_ADMIN.as_str().to_string())));
    }
    Ok(role)
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateUserRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_WRITE)?;
    let tenant_id = tenant.tenant_id();

    if services.projections().users.get_by_email(tenant_id, &body.email).is_some() {
        return Err(errors::conflict(format!("a user with email '{}' already exists", body.email)));
    }
    let roles = if body.roles.is_empty() {
        vec![Role::EMPLOYEE]
    } else {
        body.roles
            .iter()
            .map(|r| grantable_role(r, &principal))
            .collect::<Result<Vec<_>, _>>()?
    };
    let password_hash = hash_password(&body.password).map_err(errors::password_error)?;

    let user_id = UserId::new();
    dispatch_user(
        &services,
        tenant_id,
        user_id,
        UserCommand::Create(CreateUser {
            tenant_id,
            user_id,
            email: body.email,
            display_name: body.display_name,
            password_hash,
            roles,
            employee_id: None,
            occurred_at: Utc::now(),
        }),
    )?;
    if let Some(employee_id) = body.employee_id {
        link_user_and_employee(&services, tenant_id, user_id, employee_id)?;
    }

    info!(tenant_id = %tenant_id, user_id = %user_id, "user created");
    Ok(created(user_or_404(&services, tenant_id, &user_id)?))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_READ)?;
    Ok(items(services.projections().users.list(tenant.tenant_id())))
}

pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_READ)?;
    let user_id = dto::parse_user_id(&id)?;
    Ok(ok(user_or_404(&services, tenant.tenant_id(), &user_id)?))
}

pub async fn assign_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RoleRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let user_id = dto::parse_user_id(&id)?;
    let role = grantable_role(&body.role, &principal)?;
    user_or_404(&services, tenant_id, &user_id)?;

    dispatch_user(
        &services,
        tenant_id,
        user_id,
        UserCommand::AssignRole(AssignRole {
            tenant_id,
            user_id,
            role,
            actor_roles: principal.roles().to_vec(),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(user_or_404(&services, tenant_id, &user_id)?))
}

pub async fn revoke_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path((id, role)): Path<(String, String)>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let user_id = dto::parse_user_id(&id)?;
    if user_id == principal.user_id() && Role::new(role.clone()) == Role::TENANT_ADMIN {
        return Err(errors::unprocessable("administrators cannot revoke their own admin role"));
    }
    user_or_404(&services, tenant_id, &user_id)?;

    dispatch_user(
        &services,
        tenant_id,
        user_id,
        UserCommand::RevokeRole(RevokeRole {
            tenant_id,
            user_id,
            role: Role::new(role),
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(user_or_404(&services, tenant_id, &user_id)?))
}

pub async fn suspend_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let user_id = dto::parse_user_id(&id)?;
    if user_id == principal.user_id() {
        return Err(errors::unprocessable("users cannot suspend themselves"));
    }
    user_or_404(&services, tenant_id, &user_id)?;

    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "suspended by administrator".to_string());
    dispatch_user(
        &services,
        tenant_id,
        user_id,
        UserCommand::Suspend(SuspendUser {
            tenant_id,
            user_id,
            reason,
            occurred_at: Utc::now(),
        }),
    )?;
    info!(tenant_id = %tenant_id, user_id = %user_id, "user suspended");
    Ok(ok(user_or_404(&services, tenant_id, &user_id)?))
}

pub async fn activate_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_WRITE)?;
    let tenant_id = tenant.tenant_id();
    let user_id = dto::parse_user_id(&id)?;
    user_or_404(&services, tenant_id, &user_id)?;

    dispatch_user(
        &services,
        tenant_id,
        user_id,
        UserCommand::Activate(ActivateUser {
            tenant_id,
            user_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(user_or_404(&services, tenant_id, &user_id)?))
}

/// Effective permissions of a user, optionally explaining one decision.
pub async fn user_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::PermissionCheckQuery>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_READ)?;
    let tenant_id = tenant.tenant_id();
    let user = user_or_404(&services, tenant_id, &dto::parse_user_id(&id)?)?;

    let subject = Principal {
        user_id: user.user_id,
        active_tenant_id: tenant_id,
        membership: TenantMembership {
            tenant_id,
            roles: user.roles.clone(),
            permissions: effective_permissions(&user.roles),
        },
        employee_id: user.employee_id,
    };

    let explanation = query
        .check
        .map(|p| explain_authorization(&subject, &Permission::new(p)));
    Ok(ok(json!({
        "user_id": user.user_id,
        "roles": user.roles,
        "permissions": subject.membership.permissions,
        "explanation": explanation,
    })))
}

pub async fn list_roles(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::USERS_READ)?;
    Ok(ok(RbacRegistry::builtin()))
}
