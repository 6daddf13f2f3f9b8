use aura_auth::Role;
use aura_core::{AggregateId, TenantId, UserId};

/// Tenant a request acts on.
///
/// Taken from the token; a system admin may target another tenant with the
/// `X-Aura-Tenant` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated identity of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    home_tenant_id: TenantId,
    roles: Vec<Role>,
    employee_id: Option<AggregateId>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, home_tenant_id: TenantId, roles: Vec<Role>, employee_id: Option<AggregateId>) -> Self {
        Self {
            user_id,
            home_tenant_id,
            roles,
            employee_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Tenant the token was issued for.
    pub fn home_tenant_id(&self) -> TenantId {
        self.home_tenant_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Employee record linked to the login, for self-service routes.
    pub fn employee_id(&self) -> Option<AggregateId> {
        self.employee_id
    }

    pub fn is_system_admin(&self) -> bool {
        self.roles.contains(&Role::SYSTEM_ADMIN)
    }
}
