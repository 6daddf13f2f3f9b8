use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use aura_auth::{JwtValidator, UserStatus};
use aura_core::TenantId;
use aura_tenancy::TenantStatus;

use crate::app::AppServices;
use crate::app::errors::json_error;
use crate::context::{PrincipalContext, TenantContext};

/// Lets a system admin act inside a specific tenant.
pub const TENANT_HEADER: &str = "x-aura-tenant";

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub services: Arc<AppServices>,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "missing bearer token"))?;

    let claims = state
        .jwt
        .validate(token, Utc::now())
        .map_err(|e| json_error(StatusCode::UNAUTHORIZED, "invalid_token", e.to_string()))?;

    // Tokens outlive suspensions and role changes; the read models are current.
    let projections = state.services.projections();
    if !claims.tenant_id.is_system() {
        let home = projections
            .tenants
            .get(claims.tenant_id)
            .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "invalid_token", "unknown tenant"))?;
        if home.status == TenantStatus::Suspended {
            return Err(json_error(StatusCode::FORBIDDEN, "tenant_suspended", "tenant is suspended"));
        }
    }
    let user = projections
        .users
        .get(claims.tenant_id, &claims.sub)
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "invalid_token", "unknown user"))?;
    if user.status == UserStatus::Suspended {
        return Err(json_error(StatusCode::FORBIDDEN, "user_suspended", "account is suspended"));
    }

    let principal = PrincipalContext::new(user.user_id, claims.tenant_id, user.roles, user.employee_id);
    let tenant = match requested_tenant(req.headers())? {
        Some(target) if target != claims.tenant_id => {
            if !principal.is_system_admin() {
                return Err(json_error(
                    StatusCode::FORBIDDEN,
                    "tenant_isolation",
                    "only system administrators may act in another tenant",
                ));
            }
            target
        }
        _ => claims.tenant_id,
    };

    req.extensions_mut().insert(TenantContext::new(tenant));
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

fn requested_tenant(headers: &HeaderMap) -> Result<Option<TenantId>, Response> {
    let Some(value) = headers.get(TENANT_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<TenantId>().ok())
        .map(Some)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid X-Aura-Tenant header"))
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}
