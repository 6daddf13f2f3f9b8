//! The caller's in-app notifications.

use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::Path,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use aura_auth::permissions;

use crate::app::errors::{self, ApiResult};
use crate::app::routes::common::ok;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/:id/read", post(mark_read))
}

pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::NOTIFICATIONS_READ)?;
    let user_id = principal.user_id();
    let rows = services
        .projections()
        .notifications
        .list_for(tenant.tenant_id(), user_id, principal.employee_id());
    let unread = rows.iter().filter(|n| !n.is_read_by(user_id)).count();
    let count = rows.len();
    Ok(ok(json!({ "items": rows, "count": count, "unread": unread })))
}

pub async fn mark_read(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult {
    authz::require(&tenant, &principal, &permissions::NOTIFICATIONS_READ)?;
    let notification_id: Uuid = id.parse().map_err(|_| errors::bad_request("invalid notification id"))?;
    let marked = services.projections().notifications.mark_read(
        tenant.tenant_id(),
        notification_id,
        principal.user_id(),
        principal.employee_id(),
    );
    if !marked {
        return Err(errors::not_found("notification"));
    }
    Ok(ok(json!({ "notification_id": notification_id, "read": true })))
}
