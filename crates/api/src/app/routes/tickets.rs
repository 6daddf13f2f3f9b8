//! Support tickets raised by employees and worked by administrators.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    response::Response,
    routing::{get, post},
};
use chrono::Utc;
use tracing::info;

use aura_auth::permissions;
use aura_core::{AggregateId, TenantId};
use aura_infra::projections::{TicketReadModel, aggregate_types};
use aura_support::{
    AddComment, CloseTicket, OpenTicket, ReopenTicket, ResolveTicket, StartProgress, SupportTicket, TicketCommand,
};

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::{committed, created, items, ok};
use crate::app::{dto, services::AppServices};
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_ticket).get(list_tickets))
        .route("/:id", get(get_ticket))
        .route("/:id/comments", post(add_comment))
        .route("/:id/start", post(start_progress))
        .route("/:id/resolve", post(resolve_ticket))
        .route("/:id/close", post(close_ticket))
        .route("/:id/reopen", post(reopen_ticket))
}

fn dispatch_ticket(services: &AppServices, tenant_id: TenantId, ticket_id: AggregateId, command: TicketCommand) -> Result<(), Response> {
    committed(services.dispatch::<SupportTicket>(
        tenant_id,
        ticket_id,
        aggregate_types::TICKET,
        command,
        |_, id| SupportTicket::empty(id),
    ))?;
    Ok(())
}

/// Load a ticket the caller may see: managers see all, others only their own.
fn visible_ticket(
    services: &AppServices,
    tenant: &TenantContext,
    principal: &PrincipalContext,
    raw_id: &str,
) -> Result<TicketReadModel, Response> {
    let ticket_id = dto::parse_id(raw_id, "ticket")?;
    let ticket = services
        .projections()
        .tickets
        .get(tenant.tenant_id(), ticket_id)
        .ok_or_else(|| errors::not_found("ticket"))?;
    if authz::holds(tenant, principal, &permissions::TICKETS_READ) {
        return Ok(ticket);
    }
    authz::require(tenant, principal, &permissions::ESS_TICKETS)?;
    if ticket.opened_by != principal.user_id() {
        return Err(errors::not_found("ticket"));
    }
    Ok(ticket)
}

fn reload(services: &AppServices, tenant_id: TenantId, ticket_id: AggregateId) -> ApiResult {
    services
        .projections()
        .tickets
        .get(tenant_id, ticket_id)
        .map(ok)
        .ok_or_else(|| errors::not_found("ticket"))
}

pub async fn open_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::OpenTicketRequest>,
) -> ApiResult {
    if !authz::holds(&tenant, &principal, &permissions::TICKETS_MANAGE) {
        authz::require(&tenant, &principal, &permissions::ESS_TICKETS)?;
    }
    let tenant_id = tenant.tenant_id();
    let ticket_id = AggregateId::new();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket_id,
        TicketCommand::Open(OpenTicket {
            tenant_id,
            opened_by: principal.user_id(),
            subject: body.subject,
            description: body.description,
            priority: body.priority,
            occurred_at: Utc::now(),
        }),
    )?;
    info!(tenant_id = %tenant_id, ticket_id = %ticket_id, "ticket opened");
    let ticket = services
        .projections()
        .tickets
        .get(tenant_id, ticket_id)
        .ok_or_else(|| errors::not_found("ticket"))?;
    Ok(created(ticket))
}

pub async fn list_tickets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<dto::TicketQuery>,
) -> ApiResult {
    let opened_by = if authz::holds(&tenant, &principal, &permissions::TICKETS_READ) {
        query.mine.then(|| principal.user_id())
    } else {
        authz::require(&tenant, &principal, &permissions::ESS_TICKETS)?;
        Some(principal.user_id())
    };
    Ok(items(services.projections().tickets.list(tenant.tenant_id(), opened_by)))
}

pub async fn get_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    Ok(ok(visible_ticket(&services, &tenant, &principal, &id)?))
}

/// Managers and the ticket's opener may comment.
pub async fn add_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::CommentRequest>,
) -> ApiResult {
    let ticket = visible_ticket(&services, &tenant, &principal, &id)?;
    let is_opener = ticket.opened_by == principal.user_id();
    if !is_opener {
        authz::require(&tenant, &principal, &permissions::TICKETS_MANAGE)?;
    }
    let tenant_id = tenant.tenant_id();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket.ticket_id,
        TicketCommand::Comment(AddComment {
            tenant_id,
            author: principal.user_id(),
            body: body.body,
            occurred_at: Utc::now(),
        }),
    )?;
    reload(&services, tenant_id, ticket.ticket_id)
}

pub async fn start_progress(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TICKETS_MANAGE)?;
    let ticket = visible_ticket(&services, &tenant, &principal, &id)?;
    let tenant_id = tenant.tenant_id();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket.ticket_id,
        TicketCommand::StartProgress(StartProgress {
            tenant_id,
            by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
    )?;
    reload(&services, tenant_id, ticket.ticket_id)
}

pub async fn resolve_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ResolveRequest>>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TICKETS_MANAGE)?;
    let ticket = visible_ticket(&services, &tenant, &principal, &id)?;
    let tenant_id = tenant.tenant_id();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket.ticket_id,
        TicketCommand::Resolve(ResolveTicket {
            tenant_id,
            by: principal.user_id(),
            resolution: body.and_then(|Json(b)| b.resolution),
            occurred_at: Utc::now(),
        }),
    )?;
    reload(&services, tenant_id, ticket.ticket_id)
}

pub async fn close_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::TICKETS_MANAGE)?;
    let ticket = visible_ticket(&services, &tenant, &principal, &id)?;
    let tenant_id = tenant.tenant_id();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket.ticket_id,
        TicketCommand::Close(CloseTicket {
            tenant_id,
            by: principal.user_id(),
            occurred_at: Utc::now(),
        }),
    )?;
    reload(&services, tenant_id, ticket.ticket_id)
}

/// The opener may reopen a resolved ticket, as may any manager.
pub async fn reopen_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<dto::ReasonRequest>>,
) -> ApiResult {
    let ticket = visible_ticket(&services, &tenant, &principal, &id)?;
    if ticket.opened_by != principal.user_id() {
        authz::require(&tenant, &principal, &permissions::TICKETS_MANAGE)?;
    }
    let tenant_id = tenant.tenant_id();
    dispatch_ticket(
        &services,
        tenant_id,
        ticket.ticket_id,
        TicketCommand::Reopen(ReopenTicket {
            tenant_id,
            by: principal.user_id(),
            reason: body.and_then(|Json(b)| b.reason),
            occurred_at: Utc::now(),
        }),
    )?;
    reload(&services, tenant_id, ticket.ticket_id)
}
