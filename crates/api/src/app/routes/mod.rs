use axum::{
    Router,
    routing::{get, post},
};

pub mod admin;
pub mod attendance;
pub mod auth;
pub mod common;
pub mod employees;
pub mod leave;
pub mod me;
pub mod notifications;
pub mod payroll;
pub mod reports;
pub mod settings;
pub mod system;
pub mod tickets;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/me", get(me::me))
        .route("/me/password", post(auth::change_password))
        .nest("/system", system::router())
        .nest("/admin", admin::router())
        .nest("/employees", employees::router())
        .nest("/attendance", attendance::router())
        .nest("/leave", leave::router())
        .nest("/payroll", payroll::router())
        .nest("/settings", settings::router())
        .nest("/notifications", notifications::router())
        .nest("/reports", reports::router())
        .nest("/tickets", tickets::router())
}
