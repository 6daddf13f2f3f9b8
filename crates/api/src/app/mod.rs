//! HTTP application wiring (Axum router + service wiring).
//!
//! - `services.rs`: event store, bus, projections, scheduler
//! - `routes/`: one file per area
//! - `dto.rs`: request bodies and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Full router over already-built services.
pub fn router(services: Arc<AppServices>, jwt_secret: &str) -> Router {
    let jwt = Arc::new(aura_auth::Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState {
        jwt,
        services: services.clone(),
    };

    let protected = routes::router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/auth/login", post(routes::auth::login))
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}

/// Build services from configuration, start the scheduler and return the router.
pub async fn build_app(config: &AppConfig) -> anyhow::Result<(Router, Arc<AppServices>)> {
    let jwt_secret = config.jwt_secret();
    let services = services::build_services(config, &jwt_secret).await?;
    services.start_scheduler(Duration::from_secs(config.scheduler_tick_seconds));
    let app = router(services.clone(), &jwt_secret);
    Ok((app, services))
}
