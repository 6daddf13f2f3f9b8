//! Health, identity and the system administrator's tenant registry.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::Response,
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use aura_auth::{CreateUser, Role, User, UserCommand, hash_password, permissions};
use aura_core::{TenantId, UserId};
use aura_infra::projections::aggregate_types;
use aura_tenancy::{
    ChangeSubscription, InitializeSettings, ProvisionTenant, PublishAnnouncement, ReactivateTenant, Settings,
    SettingsCommand, SuspendTenant, Tenant, TenantCommand, TenantStatus, UpdateTenantProfile, normalize_slug,
};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, created, items, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/tenants", post(provision_tenant).get(list_tenants))
        .route("/tenants/:id", get(get_tenant).patch(update_tenant))
        .route("/tenants/:id/subscription", put(change_subscription))
        .route("/tenants/:id/suspend", post(suspend_tenant))
        .route("/tenants/:id/reactivate", post(reactivate_tenant))
        .route("/announcements", post(publish_announcement))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    let permissions = authz::principal_for(&tenant, &principal)
        .membership
        .permissions
        .iter()
        .map(|p| p.as_str().to_string())
        .collect::<Vec<_>>();
    Ok(ok(json!({
        "tenant_id": tenant.tenant_id().to_string(),
        "user_id": principal.user_id().to_string(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "employee_id": principal.employee_id(),
        "permissions": permissions,
    })))
}

fn dispatch_tenant(services: &AppServices, tenant_id: TenantId, command: TenantCommand) -> Result<(), Response> {
    committed(services.dispatch::<Tenant>(
        TenantId::system(),
        Tenant::stream_id(tenant_id),
        aggregate_types::TENANT,
        command,
        |_, id| Tenant::empty(TenantId::from_uuid(*id.as_uuid())),
    ))?;
    Ok(())
}

fn tenant_view(services: &AppServices, tenant_id: TenantId) -> ApiResult {
    services
        .projections()
        .tenants
        .get(tenant_id)
        .map(|t| {
            let active_employees = services.projections().employees.active_count(tenant_id);
            ok(json!({ "tenant": t, "active_employees": active_employees }))
        })
        .ok_or_else(|| errors::not_found("tenant"))
}

/// Create a tenant, its default settings and its first administrator.
pub async fn provision_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ProvisionTenantRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;

    let slug = normalize_slug(&body.slug).map_err(|e| errors::bad_request(e.to_string()))?;
    if services.projections().tenants.get_by_slug(&slug).is_some() {
        return Err(errors::conflict(format!("tenant slug '{slug}' is taken")));
    }
    let password_hash = hash_password(&body.admin.password).map_err(errors::password_error)?;

    let tenant_id = TenantId::new();
    let now = Utc::now();
    dispatch_tenant(
        &services,
        tenant_id,
        TenantCommand::Provision(ProvisionTenant {
            tenant_id,
            name: body.name.clone(),
            slug: slug.clone(),
            contact_email: body.contact_email,
            subscription: body.subscription.map(Into::into).unwrap_or_default(),
            occurred_at: now,
        }),
    )?;

    committed(services.dispatch::<Settings>(
        tenant_id,
        Settings::stream_id(tenant_id),
        aggregate_types::SETTINGS,
        SettingsCommand::Initialize(InitializeSettings {
            tenant_id,
            company_name: body.name,
            occurred_at: now,
        }),
        |_, id| Settings::empty(id),
    ))?;

    let admin_id = UserId::new();
    committed(services.dispatch::<User>(
        tenant_id,
        admin_id.into(),
        aggregate_types::USER,
        UserCommand::Create(CreateUser {
            tenant_id,
            user_id: admin_id,
            email: body.admin.email,
            display_name: body.admin.display_name,
            password_hash,
            roles: vec![Role::TENANT_ADMIN],
            employee_id: None,
            occurred_at: now,
        }),
        |_, id| User::empty(id.into()),
    ))?;

    info!(tenant_id = %tenant_id, slug = %slug, "tenant provisioned");
    Ok(created(json!({
        "tenant_id": tenant_id,
        "slug": slug,
        "admin_user_id": admin_id,
    })))
}

pub async fn list_tenants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    Ok(items(services.projections().tenants.list()))
}

pub async fn get_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    tenant_view(&services, dto::parse_tenant_id(&id)?)
}

pub async fn update_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateTenantRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    let tenant_id = dto::parse_tenant_id(&id)?;
    dispatch_tenant(
        &services,
        tenant_id,
        TenantCommand::UpdateProfile(UpdateTenantProfile {
            tenant_id,
            name: body.name,
            contact_email: body.contact_email,
            occurred_at: Utc::now(),
        }),
    )?;
    tenant_view(&services, tenant_id)
}

pub async fn change_subscription(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubscriptionRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    let tenant_id = dto::parse_tenant_id(&id)?;
    let active = services.projections().employees.active_count(tenant_id);
    if (body.seats as usize) < active {
        return Err(errors::unprocessable(format!(
            "{} seats cannot cover {active} active employees",
            body.seats
        )));
    }
    dispatch_tenant(
        &services,
        tenant_id,
        TenantCommand::ChangeSubscription(ChangeSubscription {
            tenant_id,
            subscription: body.into(),
            occurred_at: Utc::now(),
        }),
    )?;
    tenant_view(&services, tenant_id)
}

pub async fn suspend_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    let tenant_id = dto::parse_tenant_id(&id)?;
    let reason = body.and_then(|Json(b)| b.reason);
    dispatch_tenant(
        &services,
        tenant_id,
        TenantCommand::Suspend(SuspendTenant {
            tenant_id,
            reason,
            occurred_at: Utc::now(),
        }),
    )?;
    info!(tenant_id = %tenant_id, "tenant suspended");
    tenant_view(&services, tenant_id)
}

pub async fn reactivate_tenant(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;
    let tenant_id = dto::parse_tenant_id(&id)?;
    dispatch_tenant(
        &services,
        tenant_id,
        TenantCommand::Reactivate(ReactivateTenant {
            tenant_id,
            occurred_at: Utc::now(),
        }),
    )?;
    tenant_view(&services, tenant_id)
}

/// Tenant-wide notice to one tenant, or to every active tenant.
pub async fn publish_announcement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AnnouncementRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TENANTS_MANAGE)?;

    let targets: Vec<TenantId> = match body.tenant_id {
        Some(id) => {
            services
                .projections()
                .tenants
                .get(id)
                .ok_or_else(|| errors::not_found("tenant"))?;
            vec![id]
        }
        None => services
            .projections()
            .tenants
            .list()
            .into_iter()
            .filter(|t| t.status == TenantStatus::Active)
            .map(|t| t.tenant_id)
            .collect(),
    };

    let now = Utc::now();
    for tenant_id in &targets {
        dispatch_tenant(
            &services,
            *tenant_id,
            TenantCommand::PublishAnnouncement(PublishAnnouncement {
                tenant_id: *tenant_id,
                title: body.title.clone(),
                message: body.message.clone(),
                occurred_at: now,
            }),
        )?;
    }
    info!(tenants = targets.len(), "announcement published");
    Ok(ok(json!({ "delivered_to": targets.len() })))
}
