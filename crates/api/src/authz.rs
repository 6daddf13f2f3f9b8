//! Permission guard applied by handlers before dispatching or reading.
//!
//! Routes shared by administrators and employees resolve a [`Scope`]: an
//! administrator permission grants access to every employee of the tenant,
//! the matching `ess.*` permission only to the caller's own employee record.

use axum::http::StatusCode;
use axum::response::Response;

use aura_auth::{AuthzError, Permission, Principal, TenantMembership, authorize, effective_permissions};
use aura_core::AggregateId;

use crate::app::errors::json_error;
use crate::context::{PrincipalContext, TenantContext};

/// Resolve the principal for the tenant the request acts on.
///
/// Membership is the token tenant, except for system administrators whose
/// grants follow them into whichever tenant they target.
pub fn principal_for(tenant: &TenantContext, principal: &PrincipalContext) -> Principal {
    let membership_tenant = if principal.is_system_admin() {
        tenant.tenant_id()
    } else {
        principal.home_tenant_id()
    };
    Principal {
        user_id: principal.user_id(),
        active_tenant_id: tenant.tenant_id(),
        membership: TenantMembership {
            tenant_id: membership_tenant,
            roles: principal.roles().to_vec(),
            permissions: effective_permissions(principal.roles()),
        },
        employee_id: principal.employee_id(),
    }
}

pub fn require(tenant: &TenantContext, principal: &PrincipalContext, permission: &Permission) -> Result<(), Response> {
    authorize(&principal_for(tenant, principal), permission).map_err(forbidden)
}

pub fn holds(tenant: &TenantContext, principal: &PrincipalContext, permission: &Permission) -> bool {
    authorize(&principal_for(tenant, principal), permission).is_ok()
}

pub fn forbidden(err: AuthzError) -> Response {
    match err {
        AuthzError::TenantMismatch => json_error(StatusCode::FORBIDDEN, "tenant_isolation", err.to_string()),
        AuthzError::Forbidden(_) => json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Scope {
    Tenant,
    Own(AggregateId),
}

pub fn scope(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    admin: &Permission,
    self_service: &Permission,
) -> Result<Scope, Response> {
    if holds(tenant, principal, admin) {
        return Ok(Scope::Tenant);
    }
    require(tenant, principal, self_service)?;
    principal.employee_id().map(Scope::Own).ok_or_else(|| {
        json_error(
            StatusCode::FORBIDDEN,
            "forbidden",
            "this login is not linked to an employee record",
        )
    })
}

impl Scope {
    /// The employee a write targets: the requested one for administrators,
    /// the caller's own record for self-service.
    pub fn target(&self, requested: Option<AggregateId>) -> Result<AggregateId, Response> {
        match (self, requested) {
            (Scope::Tenant, Some(id)) => Ok(id),
            (Scope::Tenant, None) => Err(json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                "employee_id is required",
            )),
            (Scope::Own(own), None) => Ok(*own),
            (Scope::Own(own), Some(id)) if id == *own => Ok(id),
            (Scope::Own(_), Some(_)) => Err(json_error(
                StatusCode::FORBIDDEN,
                "forbidden",
                "employees may only act on their own records",
            )),
        }
    }

    /// Narrow a list filter: self-service always sees only its own rows.
    pub fn filter(&self, requested: Option<AggregateId>) -> Result<Option<AggregateId>, Response> {
        match self {
            Scope::Tenant => Ok(requested),
            Scope::Own(_) => self.target(requested).map(Some),
        }
    }

    pub fn allows(&self, employee_id: AggregateId) -> bool {
        match self {
            Scope::Tenant => true,
            Scope::Own(own) => *own == employee_id,
        }
    }

    pub fn own(&self) -> Option<AggregateId> {
        match self {
            Scope::Tenant => None,
            Scope::Own(id) => Some(*id),
        }
    }
}

#[cfg(test)]
mod tests {
    use aura_auth::{Role, permissions};
    use aura_core::{TenantId, UserId};

    use super::*;

    #[test]
    fn system_admin_grants_follow_target_tenant() {
        let target = TenantContext::new(TenantId::new());
        let admin = PrincipalContext::new(UserId::new(), TenantId::system(), vec![Role::SYSTEM_ADMIN], None);
        assert!(holds(&target, &admin, &permissions::PAYROLL_APPROVE));

        let tenant_admin = PrincipalContext::new(UserId::new(), TenantId::new(), vec![Role::TENANT_ADMIN], None);
        assert!(!holds(&target, &tenant_admin, &permissions::EMPLOYEES_READ));
    }

    #[test]
    fn employee_scope_is_pinned_to_own_record() {
        let t = TenantId::new();
        let own = AggregateId::new();
        let ctx = TenantContext::new(t);
        let emp = PrincipalContext::new(UserId::new(), t, vec![Role::EMPLOYEE], Some(own));

        let s = scope(&ctx, &emp, &permissions::LEAVE_WRITE, &permissions::ESS_LEAVE).unwrap();
        assert_eq!(s, Scope::Own(own));
        assert_eq!(s.target(None).unwrap(), own);
        assert!(s.target(Some(AggregateId::new())).is_err());
        assert!(!s.allows(AggregateId::new()));

        let unlinked = PrincipalContext::new(UserId::new(), t, vec![Role::EMPLOYEE], None);
        assert!(scope(&ctx, &unlinked, &permissions::LEAVE_WRITE, &permissions::ESS_LEAVE).is_err());
    }
}
