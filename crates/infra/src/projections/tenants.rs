//! System-wide tenant registry.
//!
//! Tenant streams live in the system tenant, so every row is stored under
//! [`TenantId::system()`] and keyed by the described tenant's id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::TenantId;
use aura_events::EventEnvelope;
use aura_tenancy::{Subscription, TenantEvent, TenantStatus};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantReadModel {
    pub tenant_id: TenantId,
    pub name: String,
    pub slug: String,
    pub contact_email: String,
    pub status: TenantStatus,
    pub subscription: Subscription,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TenantsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> TenantsProjection<S>
where
    S: TenantStore<TenantId, TenantReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId) -> Option<TenantReadModel> {
        self.store.get(TenantId::system(), &tenant_id)
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<TenantReadModel> {
        let slug = slug.trim().to_lowercase();
        self.list().into_iter().find(|t| t.slug == slug)
    }

    /// All tenants, newest first.
    pub fn list(&self) -> Vec<TenantReadModel> {
        let mut rows = self.store.list(TenantId::system());
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::TENANT {
            return Ok(());
        }
        ensure_tenant(envelope, TenantId::system())?;
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: TenantEvent = decode(envelope)?;
        let system = TenantId::system();
        match event {
            TenantEvent::Provisioned(e) => {
                self.store.upsert(
                    system,
                    e.tenant_id,
                    TenantReadModel {
                        tenant_id: e.tenant_id,
                        name: e.name,
                        slug: e.slug,
                        contact_email: e.contact_email,
                        status: TenantStatus::Active,
                        subscription: e.subscription,
                        created_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            TenantEvent::ProfileUpdated(e) => self.update(e.tenant_id, e.occurred_at, |t| {
                t.name = e.name;
                t.contact_email = e.contact_email;
            }),
            TenantEvent::SubscriptionChanged(e) => self.update(e.tenant_id, e.occurred_at, |t| {
                t.subscription = e.subscription;
            }),
            TenantEvent::Suspended(e) => self.update(e.tenant_id, e.occurred_at, |t| {
                t.status = TenantStatus::Suspended;
            }),
            TenantEvent::Reactivated(e) => self.update(e.tenant_id, e.occurred_at, |t| {
                t.status = TenantStatus::Active;
            }),
            TenantEvent::AnnouncementPublished(_) => {}
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, at: DateTime<Utc>, f: impl FnOnce(&mut TenantReadModel)) {
        if let Some(mut row) = self.store.get(TenantId::system(), &tenant_id) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(TenantId::system(), tenant_id, row);
        }
    }

    pub fn reset(&self) {
        self.store.clear_tenant(TenantId::system());
        self.cursors.clear();
    }
}
