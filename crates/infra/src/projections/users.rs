//! Login accounts per tenant. Also the credential lookup used by `/auth/login`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_auth::{Role, UserEvent, UserStatus};
use aura_core::{AggregateId, TenantId, UserId};
use aura_events::EventEnvelope;

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReadModel {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub status: UserStatus,
    pub employee_id: Option<AggregateId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct UsersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> UsersProjection<S>
where
    S: TenantStore<UserId, UserReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, user_id: &UserId) -> Option<UserReadModel> {
        self.store.get(tenant_id, user_id)
    }

    /// Emails are stored lowercased, so lookups normalise the same way.
    pub fn get_by_email(&self, tenant_id: TenantId, email: &str) -> Option<UserReadModel> {
        let email = email.trim().to_lowercase();
        self.store.list(tenant_id).into_iter().find(|u| u.email == email)
    }

    pub fn get_by_employee(&self, tenant_id: TenantId, employee_id: AggregateId) -> Option<UserReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|u| u.employee_id == Some(employee_id))
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<UserReadModel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.email.cmp(&b.email));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::USER {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: UserEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        match event {
            UserEvent::Created(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    e.user_id,
                    UserReadModel {
                        user_id: e.user_id,
                        tenant_id: e.tenant_id,
                        email: e.email,
                        display_name: e.display_name,
                        password_hash: e.password_hash,
                        roles: e.roles,
                        status: UserStatus::Active,
                        employee_id: e.employee_id,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            UserEvent::RoleAssigned(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| {
                    if !u.roles.contains(&e.role) {
                        u.roles.push(e.role);
                    }
                });
            }
            UserEvent::RoleRevoked(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| u.roles.retain(|r| *r != e.role));
            }
            UserEvent::Suspended(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| u.status = UserStatus::Suspended);
            }
            UserEvent::Activated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| u.status = UserStatus::Active);
            }
            UserEvent::PasswordChanged(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| u.password_hash = e.password_hash);
            }
            UserEvent::LinkedToEmployee(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, e.user_id, e.occurred_at, |u| u.employee_id = Some(e.employee_id));
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, user_id: UserId, at: DateTime<Utc>, f: impl FnOnce(&mut UserReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &user_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, user_id, row);
        }
    }

    /// Forget the given tenants' rows and every cursor (rebuild support).
    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
