use serde::{Deserialize, Serialize};

use aura_core::{AggregateId, TenantId, UserId};

use crate::{Permission, Role};

/// A principal's grants inside one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantMembership {
    pub tenant_id: TenantId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

/// A fully resolved principal for authorization decisions.
///
/// `active_tenant_id` is the tenant the request acts on. For everyone except
/// system administrators it equals the token tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
    /// Employee record linked to the login, if any (self-service scope).
    pub employee_id: Option<AggregateId>,
}

impl Principal {
    pub fn has_role(&self, role: &Role) -> bool {
        self.membership.roles.iter().any(|r| r == role)
    }

    pub fn is_system_admin(&self) -> bool {
        self.has_role(&Role::SYSTEM_ADMIN)
    }
}
