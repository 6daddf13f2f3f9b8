//! User aggregate: login accounts and their role assignments (event-sourced).
//!
//! A user belongs to exactly one tenant. Platform operators are users of the
//! system tenant and hold `system_admin`; every other user holds
//! `tenant_admin` and/or `employee` inside a customer tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aura_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId, require_email, require_non_blank};
use aura_events::Event;

use crate::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    /// Cannot log in; existing tokens are refused by the login lookup only.
    Suspended,
}

impl core::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            UserStatus::Active => f.write_str("active"),
            UserStatus::Suspended => f.write_str("suspended"),
        }
    }
}

/// # Invariants
/// - `tenant_id` never changes after creation.
/// - `system_admin` is held only by users of the system tenant, and system
///   tenant users hold nothing else.
/// - A user always keeps at least one role.
/// - Suspended users cannot be granted new roles.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub tenant_id: Option<TenantId>,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub employee_id: Option<AggregateId>,
    pub status: UserStatus,
    pub version: u64,
    pub created: bool,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: UserId::new(),
            tenant_id: None,
            email: String::new(),
            display_name: String::new(),
            password_hash: String::new(),
            roles: Vec::new(),
            employee_id: None,
            status: UserStatus::Active,
            version: 0,
            created: false,
        }
    }
}

impl User {
    pub fn new(tenant_id: TenantId, id: UserId) -> Self {
        Self {
            id,
            tenant_id: Some(tenant_id),
            ..Default::default()
        }
    }

    pub fn empty(id: UserId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn ensure_exists(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::NotFound);
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        Ok(())
    }
}

/// Role placement rule shared by create and assign.
fn ensure_role_fits_tenant(tenant_id: TenantId, role: &Role) -> Result<(), DomainError> {
    match (tenant_id.is_system(), *role == Role::SYSTEM_ADMIN) {
        (true, false) => Err(DomainError::validation(format!(
            "system tenant users can only hold {}",
            Role::SYSTEM_ADMIN
        ))),
        (false, true) => Err(DomainError::validation(format!(
            "{} can only be held in the system tenant",
            Role::SYSTEM_ADMIN
        ))),
        _ => Ok(()),
    }
}

impl AggregateRoot for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    /// Already hashed (see `hash_password`); plain passwords never reach the aggregate.
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    /// Roles of the acting principal, for the escalation check.
    pub actor_roles: Vec<Role>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRole {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUser {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePassword {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEmployee {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum UserCommand {
    Create(CreateUser),
    AssignRole(AssignRole),
    RevokeRole(RevokeRole),
    Suspend(SuspendUser),
    Activate(ActivateUser),
    ChangePassword(ChangePassword),
    LinkEmployee(LinkEmployee),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub employee_id: Option<AggregateId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssigned {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRevoked {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub role: Role,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSuspended {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserActivated {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordChanged {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub password_hash: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserLinkedToEmployee {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub employee_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserEvent {
    Created(UserCreated),
    RoleAssigned(RoleAssigned),
    RoleRevoked(RoleRevoked),
    Suspended(UserSuspended),
    Activated(UserActivated),
    PasswordChanged(PasswordChanged),
    LinkedToEmployee(UserLinkedToEmployee),
}

impl Event for UserEvent {
    fn event_type(&self) -> &'static str {
        match self {
            UserEvent::Created(_) => "auth.user.created",
            UserEvent::RoleAssigned(_) => "auth.user.role_assigned",
            UserEvent::RoleRevoked(_) => "auth.user.role_revoked",
            UserEvent::Suspended(_) => "auth.user.suspended",
            UserEvent::Activated(_) => "auth.user.activated",
            UserEvent::PasswordChanged(_) => "auth.user.password_changed",
            UserEvent::LinkedToEmployee(_) => "auth.user.linked_to_employee",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            UserEvent::Created(e) => e.occurred_at,
            UserEvent::RoleAssigned(e) => e.occurred_at,
            UserEvent::RoleRevoked(e) => e.occurred_at,
            UserEvent::Suspended(e) => e.occurred_at,
            UserEvent::Activated(e) => e.occurred_at,
            UserEvent::PasswordChanged(e) => e.occurred_at,
            UserEvent::LinkedToEmployee(e) => e.occurred_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("{0}")]
    Domain(#[from] DomainError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregate Implementation
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for User {
    type Command = UserCommand;
    type Event = UserEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            UserEvent::Created(e) => {
                self.id = e.user_id;
                self.tenant_id = Some(e.tenant_id);
                self.email = e.email.clone();
                self.display_name = e.display_name.clone();
                self.password_hash = e.password_hash.clone();
                self.roles = e.roles.clone();
                self.employee_id = e.employee_id;
                self.status = UserStatus::Active;
                self.created = true;
            }
            UserEvent::RoleAssigned(e) => self.roles.push(e.role.clone()),
            UserEvent::RoleRevoked(e) => self.roles.retain(|r| *r != e.role),
            UserEvent::Suspended(_) => self.status = UserStatus::Suspended,
            UserEvent::Activated(_) => self.status = UserStatus::Active,
            UserEvent::PasswordChanged(e) => self.password_hash = e.password_hash.clone(),
            UserEvent::LinkedToEmployee(e) => self.employee_id = Some(e.employee_id),
        }
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            UserCommand::Create(cmd) => self.handle_create(cmd),
            UserCommand::AssignRole(cmd) => self.handle_assign_role(cmd),
            UserCommand::RevokeRole(cmd) => self.handle_revoke_role(cmd),
            UserCommand::Suspend(cmd) => self.handle_suspend(cmd),
            UserCommand::Activate(cmd) => self.handle_activate(cmd),
            UserCommand::ChangePassword(cmd) => self.handle_change_password(cmd),
            UserCommand::LinkEmployee(cmd) => self.handle_link_employee(cmd),
        }
    }
}

impl User {
    fn handle_create(&self, cmd: &CreateUser) -> Result<Vec<UserEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("user already exists"));
        }

        let email = cmd.email.trim().to_lowercase();
        require_email("email", &email)?;
        require_non_blank("display_name", &cmd.display_name)?;
        require_non_blank("password_hash", &cmd.password_hash)?;

        if cmd.roles.is_empty() {
            return Err(DomainError::validation("a user needs at least one role"));
        }
        for role in &cmd.roles {
            ensure_role_fits_tenant(cmd.tenant_id, role)?;
        }

        let mut roles = cmd.roles.clone();
        roles.dedup();

        Ok(vec![UserEvent::Created(UserCreated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            email,
            display_name: cmd.display_name.trim().to_string(),
            password_hash: cmd.password_hash.clone(),
            roles,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_role(&self, cmd: &AssignRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user is suspended"));
        }
        if self.has_role(&cmd.role) {
            return Err(DomainError::invariant("role already assigned"));
        }
        ensure_role_fits_tenant(cmd.tenant_id, &cmd.role)?;

        // Admins grant any role that fits the tenant; others only roles they hold.
        let actor_is_admin = cmd.actor_roles.iter().any(Role::is_admin);
        let actor_has_role = cmd.actor_roles.contains(&cmd.role);
        if !actor_is_admin && !actor_has_role {
            return Err(DomainError::Unauthorized);
        }

        Ok(vec![UserEvent::RoleAssigned(RoleAssigned {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revoke_role(&self, cmd: &RevokeRole) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if !self.has_role(&cmd.role) {
            return Err(DomainError::invariant("role not assigned"));
        }
        if self.roles.len() == 1 {
            return Err(DomainError::invariant("cannot revoke the last role"));
        }

        Ok(vec![UserEvent::RoleRevoked(RoleRevoked {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            role: cmd.role.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.status == UserStatus::Suspended {
            return Err(DomainError::invariant("user already suspended"));
        }

        Ok(vec![UserEvent::Suspended(UserSuspended {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivateUser) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if self.status == UserStatus::Active {
            return Err(DomainError::invariant("user already active"));
        }

        Ok(vec![UserEvent::Activated(UserActivated {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_password(&self, cmd: &ChangePassword) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;
        require_non_blank("password_hash", &cmd.password_hash)?;

        Ok(vec![UserEvent::PasswordChanged(PasswordChanged {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            password_hash: cmd.password_hash.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_link_employee(&self, cmd: &LinkEmployee) -> Result<Vec<UserEvent>, DomainError> {
        self.ensure_exists(cmd.tenant_id)?;

        if cmd.tenant_id.is_system() {
            return Err(DomainError::validation("system users cannot be linked to employees"));
        }
        if self.employee_id == Some(cmd.employee_id) {
            return Ok(vec![]);
        }
        if self.employee_id.is_some() {
            return Err(DomainError::conflict("user is already linked to another employee"));
        }

        Ok(vec![UserEvent::LinkedToEmployee(UserLinkedToEmployee {
            tenant_id: cmd.tenant_id,
            user_id: cmd.user_id,
            employee_id: cmd.employee_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
