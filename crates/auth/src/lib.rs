//! `aura-auth`: authentication and authorization boundary.
//!
//! Decoupled from HTTP and storage: the API layer feeds tokens in and gets
//! claims and allow/deny decisions out.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;
pub mod user;

pub use authorize::{
    AuthorizationExplanation, AuthzError, DenialKind, authorize,
    explain_authorization,
};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtError, JwtValidator};
pub use password::{PasswordError, hash_password, validate_password_policy, verify_password};
pub use permissions::Permission;
pub use policy::{RbacRegistry, default_role_permissions, effective_permissions};
pub use principal::{Principal, TenantMembership};
pub use roles::Role;
pub use user::{
    ActivateUser, AssignRole, ChangePassword, CreateUser, LinkEmployee, PasswordChanged, RevokeRole,
    RoleAssigned, RoleRevoked, SuspendUser, User, UserActivated, UserCommand, UserCreated, UserError,
    UserEvent, UserLinkedToEmployee, UserStatus, UserSuspended,
};
