//! Current tenant settings and report schedules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use aura_core::{AggregateId, TenantId};
use aura_events::EventEnvelope;
use aura_tenancy::{NotificationToggles, ReportSchedule, SettingsEvent, TenantSettings};

use super::{ProjectionError, StreamCursors, aggregate_types, decode, ensure_tenant};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsReadModel {
    pub settings: TenantSettings,
    pub schedules: Vec<ReportSchedule>,
    pub updated_at: DateTime<Utc>,
}

/// One row per tenant, keyed by the tenant's settings stream id.
#[derive(Debug)]
pub struct SettingsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> SettingsProjection<S>
where
    S: TenantStore<AggregateId, SettingsReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId) -> Option<SettingsReadModel> {
        self.store.get(tenant_id, &aura_tenancy::Settings::stream_id(tenant_id))
    }

    /// Toggles in force for a tenant; everything on until settings exist.
    pub fn toggles(&self, tenant_id: TenantId) -> NotificationToggles {
        self.get(tenant_id)
            .map(|s| s.settings.notifications)
            .unwrap_or_default()
    }

    pub fn schedules(&self, tenant_id: TenantId) -> Vec<ReportSchedule> {
        self.get(tenant_id).map(|s| s.schedules).unwrap_or_default()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_types::SETTINGS {
            return Ok(());
        }
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        let event: SettingsEvent = decode(envelope)?;
        let tenant_id = envelope.tenant_id();
        let key = envelope.aggregate_id();
        match event {
            SettingsEvent::Initialized(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.store.upsert(
                    tenant_id,
                    key,
                    SettingsReadModel {
                        settings: e.settings,
                        schedules: vec![],
                        updated_at: e.occurred_at,
                    },
                );
            }
            SettingsEvent::Updated(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, key, e.occurred_at, |s| s.settings = e.settings);
            }
            SettingsEvent::ReportScheduleAdded(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, key, e.occurred_at, |s| s.schedules.push(e.schedule));
            }
            SettingsEvent::ReportScheduleRemoved(e) => {
                ensure_tenant(envelope, e.tenant_id)?;
                self.update(tenant_id, key, e.occurred_at, |s| s.schedules.retain(|x| x.id != e.schedule_id));
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn update(&self, tenant_id: TenantId, key: AggregateId, at: DateTime<Utc>, f: impl FnOnce(&mut SettingsReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &key) {
            f(&mut row);
            row.updated_at = at;
            self.store.upsert(tenant_id, key, row);
        }
    }

    pub fn reset(&self, tenants: &[TenantId]) {
        for t in tenants {
            self.store.clear_tenant(*t);
        }
        self.cursors.clear();
    }
}
