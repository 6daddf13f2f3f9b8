use std::sync::Arc;

use axum::{Extension, Json, http::StatusCode};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use aura_auth::{ChangePassword, UserCommand, UserStatus, hash_password, verify_password};
use aura_core::TenantId;
use aura_tenancy::TenantStatus;

use crate::app::errors::{self, ApiResult, json_error};
use crate::app::routes::common::{dispatch_user, ok};
use crate::app::{dto, services::AppServices};
use crate::context::PrincipalContext;

fn invalid_credentials() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "invalid_credentials", "invalid credentials")
}

/// Exchange e-mail and password for a bearer token.
///
/// Tenant users name their tenant by slug; system administrators omit it and
/// authenticate against the system tenant.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::LoginRequest>,
) -> ApiResult {
    let projections = services.projections();

    let slug = body
        .tenant_slug
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty());
    let tenant_id = match slug {
        None => TenantId::system(),
        Some(slug) => {
            let tenant = projections.tenants.get_by_slug(&slug).ok_or_else(invalid_credentials)?;
            if tenant.status == TenantStatus::Suspended {
                return Err(json_error(StatusCode::FORBIDDEN, "tenant_suspended", "tenant is suspended"));
            }
            tenant.tenant_id
        }
    };

    let user = projections
        .users
        .get_by_email(tenant_id, &body.email)
        .ok_or_else(invalid_credentials)?;

    let verified = verify_password(&body.password, &user.password_hash).map_err(|e| {
        warn!(user_id = %user.user_id, error = %e, "stored password hash unusable");
        invalid_credentials()
    })?;
    if !verified {
        return Err(invalid_credentials());
    }
    if user.status == UserStatus::Suspended {
        return Err(json_error(StatusCode::FORBIDDEN, "user_suspended", "account is suspended"));
    }

    let (token, claims) = services
        .issuer()
        .issue(user.user_id, tenant_id, user.roles.clone(), user.employee_id, Utc::now())
        .map_err(|e| json_error(StatusCode::INTERNAL_SERVER_ERROR, "token_error", e.to_string()))?;

    info!(tenant_id = %tenant_id, user_id = %user.user_id, "login succeeded");
    Ok(ok(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_at": claims.expires_at,
        "user": {
            "user_id": user.user_id,
            "tenant_id": tenant_id,
            "email": user.email,
            "display_name": user.display_name,
            "roles": user.roles,
            "employee_id": user.employee_id,
        },
    })))
}

/// Replace the caller's own password after re-checking the current one.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ChangePasswordRequest>,
) -> ApiResult {
    let tenant_id = principal.home_tenant_id();
    let user = services
        .projections()
        .users
        .get(tenant_id, &principal.user_id())
        .ok_or_else(|| errors::not_found("user"))?;

    let verified = verify_password(&body.current_password, &user.password_hash).map_err(errors::password_error)?;
    if !verified {
        return Err(invalid_credentials());
    }
    let password_hash = hash_password(&body.new_password).map_err(errors::password_error)?;

    dispatch_user(
        &services,
        tenant_id,
        user.user_id,
        UserCommand::ChangePassword(ChangePassword {
            tenant_id,
            user_id: user.user_id,
            password_hash,
            occurred_at: Utc::now(),
        }),
    )?;
    info!(tenant_id = %tenant_id, user_id = %user.user_id, "password changed");
    Ok(ok(json!({ "changed": true })))
}
