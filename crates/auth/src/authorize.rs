use serde::Serialize;
use thiserror::Error;

use aura_core::{TenantId, UserId};

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: no IO, no panics.
///
/// The membership must belong to the tenant the request acts on, and it must
/// hold either the wildcard or the exact permission.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    let granted = principal
        .membership
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    TenantMismatch,
    MissingPermission,
}

/// Why a decision came out the way it did (admin "inspect permissions" view).
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: String,
    pub granted: bool,
    pub reason: String,
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub roles: Vec<String>,
    pub effective_permissions: Vec<String>,
    pub denial: Option<DenialKind>,
    pub suggestions: Vec<String>,
}

pub fn explain_authorization(principal: &Principal, required: &Permission) -> AuthorizationExplanation {
    let roles: Vec<String> = principal
        .membership
        .roles
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();
    let mut effective: Vec<String> = principal
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str().to_string())
        .collect();
    effective.sort();
    effective.dedup();

    let base = AuthorizationExplanation {
        required_permission: required.as_str().to_string(),
        granted: false,
        reason: String::new(),
        user_id: principal.user_id,
        active_tenant_id: principal.active_tenant_id,
        roles,
        effective_permissions: effective,
        denial: None,
        suggestions: Vec::new(),
    };

    match authorize(principal, required) {
        Ok(()) => {
            let reason = if principal.membership.permissions.iter().any(|p| p.is_wildcard()) {
                "granted by wildcard permission '*'".to_string()
            } else {
                format!("granted: principal holds '{}'", required.as_str())
            };
            AuthorizationExplanation { granted: true, reason, ..base }
        }
        Err(AuthzError::TenantMismatch) => AuthorizationExplanation {
            reason: format!(
                "membership is for tenant {} but the request targets tenant {}",
                principal.membership.tenant_id, principal.active_tenant_id
            ),
            denial: Some(DenialKind::TenantMismatch),
            suggestions: vec!["sign in to the tenant that owns the resource".to_string()],
            ..base
        },
        Err(AuthzError::Forbidden(_)) => AuthorizationExplanation {
            reason: format!("missing permission '{}'", required.as_str()),
            denial: Some(DenialKind::MissingPermission),
            suggestions: vec![format!(
                "assign a role that grants '{}' (tenant_admin grants every tenant permission)",
                required.as_str()
            )],
            ..base
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, TenantMembership, effective_permissions, permissions};

    fn principal(roles: Vec<Role>, tenant: TenantId, active: TenantId) -> Principal {
        Principal {
            user_id: UserId::new(),
            active_tenant_id: active,
            membership: TenantMembership {
                tenant_id: tenant,
                permissions: effective_permissions(&roles),
                roles,
            },
            employee_id: None,
        }
    }

    #[test]
    fn tenant_admin_can_approve_leave() {
        let t = TenantId::new();
        let p = principal(vec![Role::TENANT_ADMIN], t, t);
        assert!(authorize(&p, &permissions::LEAVE_APPROVE).is_ok());
    }

    #[test]
    fn employee_is_forbidden_from_payroll() {
        let t = TenantId::new();
        let p = principal(vec![Role::EMPLOYEE], t, t);
        assert_eq!(
            authorize(&p, &permissions::PAYROLL_WRITE),
            Err(AuthzError::Forbidden("payroll.write".to_string()))
        );
    }

    #[test]
    fn cross_tenant_is_rejected_even_with_wildcard() {
        let p = principal(vec![Role::SYSTEM_ADMIN], TenantId::new(), TenantId::new());
        assert_eq!(authorize(&p, &permissions::EMPLOYEES_READ), Err(AuthzError::TenantMismatch));
    }

    #[test]
    fn explanation_suggests_a_role() {
        let t = TenantId::new();
        let p = principal(vec![Role::EMPLOYEE], t, t);
        let ex = explain_authorization(&p, &permissions::LEAVE_APPROVE);
        assert!(!ex.granted);
        assert_eq!(ex.denial, Some(DenialKind::MissingPermission));
        assert!(!ex.suggestions.is_empty());

        let ex = explain_authorization(&p, &permissions::ESS_LEAVE);
        assert!(ex.granted);
    }
}
