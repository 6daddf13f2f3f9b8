//! Role → permission policy and the RBAC registry used by the admin UI.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::permissions::{self, Permission};
use crate::Role;

/// Built-in role mapping.
///
/// - `system_admin`: wildcard.
/// - `tenant_admin`: everything inside the tenant.
/// - `employee`: self-service only.
pub fn default_role_permissions(role: &Role) -> Vec<Permission> {
    match role.as_str() {
        "system_admin" => vec![permissions::WILDCARD],
        "tenant_admin" => permissions::TENANT_ADMIN_SET.to_vec(),
        "employee" => permissions::EMPLOYEE_SET.to_vec(),
        _ => Vec::new(),
    }
}

/// Union of the permissions granted by `roles`, sorted and de-duplicated.
pub fn effective_permissions(roles: &[Role]) -> Vec<Permission> {
    let set: BTreeSet<Permission> = roles.iter().flat_map(default_role_permissions).collect();
    set.into_iter().collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: String,
    pub description: &'static str,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: String,
    pub area: String,
    pub description: String,
}

/// Read-only view of roles and permissions for audit screens.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    pub permissions: BTreeMap<String, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn builtin() -> Self {
        let mut perms = BTreeMap::new();
        let roles = Role::builtin()
            .into_iter()
            .map(|role| {
                let granted = default_role_permissions(&role);
                for p in &granted {
                    perms.entry(p.as_str().to_string()).or_insert_with(|| PermissionDefinition {
                        name: p.as_str().to_string(),
                        area: p.area().to_string(),
                        description: describe_permission(p),
                    });
                }
                RoleDefinition {
                    name: role.as_str().to_string(),
                    description: describe_role(&role),
                    permissions: granted.iter().map(|p| p.as_str().to_string()).collect(),
                }
            })
            .collect();

        Self { roles, permissions: perms }
    }
}

fn describe_role(role: &Role) -> &'static str {
    match role.as_str() {
        "system_admin" => "Platform operator with access to every tenant",
        "tenant_admin" => "Manages one organisation's employees, leave, payroll and settings",
        "employee" => "Self-service access to own profile, attendance, leave and payslips",
        _ => "Custom role",
    }
}

fn describe_permission(p: &Permission) -> String {
    if p.is_wildcard() {
        return "All permissions in every tenant".to_string();
    }
    let (area, action) = p.as_str().split_once('.').unwrap_or((p.as_str(), ""));
    if area == "ess" {
        return format!("Self-service access to own {action}");
    }
    let verb = match action {
        "read" => "View",
        "write" => "Create and update",
        "approve" => "Approve or reject",
        "manage" => "Administer",
        "schedule" => "Schedule delivery of",
        other => other,
    };
    format!("{verb} {area}")
}
