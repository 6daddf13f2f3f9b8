//! Tenant settings.

use std::sync::Arc;

use axum::{Extension, Json, Router, routing::get};
use chrono::Utc;
use serde_json::json;

use aura_auth::permissions;
use aura_infra::projections::aggregate_types;
use aura_tenancy::{Settings, SettingsCommand, SettingsPatch, UpdateSettings};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, ok};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new().route("/", get(get_settings).patch(update_settings))
}

fn current(services: &AppServices, tenant: &TenantContext) -> ApiResult {
    services
        .projections()
        .settings
        .get(tenant.tenant_id())
        .map(|s| ok(json!({ "settings": s.settings, "updated_at": s.updated_at })))
        .ok_or_else(|| errors::not_found("settings"))
}

pub async fn get_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::SETTINGS_READ)?;
    current(&services, &tenant)
}

pub async fn update_settings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::SETTINGS_WRITE)?;
    let tenant_id = tenant.tenant_id();
    committed(services.dispatch::<Settings>(
        tenant_id,
        Settings::stream_id(tenant_id),
        aggregate_types::SETTINGS,
        SettingsCommand::Update(UpdateSettings {
            tenant_id,
            patch,
            occurred_at: Utc::now(),
        }),
        |_, id| Settings::empty(id),
    ))?;
    current(&services, &tenant)
}
