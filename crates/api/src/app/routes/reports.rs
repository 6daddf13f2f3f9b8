//! Report downloads and e-mailed report schedules.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use aura_auth::permissions;
use aura_core::AggregateId;
use aura_infra::projections::aggregate_types;
use aura_infra::reports::{self, ReportParams};
use aura_tenancy::{AddReportSchedule, RemoveReportSchedule, ReportSchedule, Settings, SettingsCommand};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, created, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/schedules", post(create_schedule).get(list_schedules))
        .route("/schedules/:id", delete(delete_schedule))
        .route("/schedules/:id/run", post(run_schedule))
        .route("/:kind", get(download_report))
}

/// Render a report and return it as an attachment.
pub async fn download_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(kind): Path<String>,
    Query(query): Query<dto::ReportQuery>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::REPORTS_READ)?;
    let kind = dto::parse_kind(&kind)?;
    let format = dto::parse_format(query.format.as_deref())?;
    let params = ReportParams {
        from: query.from,
        to: query.to,
        period: query.period.as_deref().map(dto::parse_period).transpose()?,
    };

    let table = reports::build_report(services.projections(), tenant.tenant_id(), kind, &params);
    let file = reports::render(&table, format).map_err(errors::report_error)?;
    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.bytes,
    )
        .into_response())
}

fn dispatch_settings(services: &AppServices, tenant: &TenantContext, command: SettingsCommand) -> Result<(), axum::response::Response> {
    let tenant_id = tenant.tenant_id();
    committed(services.dispatch::<Settings>(
        tenant_id,
        Settings::stream_id(tenant_id),
        aggregate_types::SETTINGS,
        command,
        |_, id| Settings::empty(id),
    ))?;
    Ok(())
}

pub async fn create_schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateScheduleRequest>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::REPORTS_SCHEDULE)?;
    let now = Utc::now();
    let schedule = ReportSchedule {
        id: AggregateId::new(),
        name: body.name,
        cron: body.cron,
        kind: dto::parse_kind(&body.kind)?,
        format: dto::parse_format(Some(&body.format))?,
        recipients: body.recipients,
        created_at: now,
    };
    let next_run = schedule.next_after(now);

    dispatch_settings(
        &services,
        &tenant,
        SettingsCommand::AddReportSchedule(AddReportSchedule {
            tenant_id: tenant.tenant_id(),
            schedule: schedule.clone(),
            occurred_at: now,
        }),
    )?;
    info!(tenant_id = %tenant.tenant_id(), schedule_id = %schedule.id, cron = %schedule.cron, "report schedule created");
    Ok(created(json!({ "schedule": schedule, "next_run": next_run })))
}

pub async fn list_schedules(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::REPORTS_SCHEDULE)?;
    let now = Utc::now();
    let rows: Vec<_> = services
        .projections()
        .settings
        .schedules(tenant.tenant_id())
        .into_iter()
        .map(|s| {
            let state = services.scheduler().run_state(s.id);
            let next_run = s.next_after(now);
            json!({ "schedule": s, "next_run": next_run, "last_run": state.last_run, "last_error": state.last_error })
        })
        .collect();
    let count = rows.len();
    Ok(ok(json!({ "items": rows, "count": count })))
}

pub async fn delete_schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::REPORTS_SCHEDULE)?;
    let schedule_id = dto::parse_id(&id, "schedule")?;
    dispatch_settings(
        &services,
        &tenant,
        SettingsCommand::RemoveReportSchedule(RemoveReportSchedule {
            tenant_id: tenant.tenant_id(),
            schedule_id,
            occurred_at: Utc::now(),
        }),
    )?;
    Ok(ok(json!({ "schedule_id": schedule_id, "deleted": true })))
}

/// Deliver a schedule now; the run is recorded like a timed one.
pub async fn run_schedule(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::REPORTS_SCHEDULE)?;
    let schedule_id = dto::parse_id(&id, "schedule")?;
    let state = services
        .scheduler()
        .run_now(tenant.tenant_id(), schedule_id)
        .await
        .map_err(errors::schedule_error)?;
    Ok(ok(json!({ "schedule_id": schedule_id, "last_run": state.last_run, "last_error": state.last_error })))
}
