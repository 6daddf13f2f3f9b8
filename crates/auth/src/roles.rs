use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Role identifier used for RBAC.
///
/// Three roles are built in; the type stays an open string so tokens minted
/// by older deployments with extra roles still deserialize (unknown roles
/// simply grant nothing).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    /// Platform operator; acts across tenants.
    pub const SYSTEM_ADMIN: Role = Role(Cow::Borrowed("system_admin"));
    /// Manages one tenant's HR data.
    pub const TENANT_ADMIN: Role = Role(Cow::Borrowed("tenant_admin"));
    /// Self-service: own profile, attendance, leave, payslips, tickets.
    pub const EMPLOYEE: Role = Role(Cow::Borrowed("employee"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn builtin() -> [Role; 3] {
        [Role::SYSTEM_ADMIN, Role::TENANT_ADMIN, Role::EMPLOYEE]
    }

    pub fn is_builtin(&self) -> bool {
        Self::builtin().iter().any(|r| r == self)
    }

    /// Admin roles may grant any tenant role.
    pub fn is_admin(&self) -> bool {
        *self == Role::SYSTEM_ADMIN || *self == Role::TENANT_ADMIN
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
