//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store and notifier wiring behind the provisioning service
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(services: Arc<services::AppServices>) -> Router {
    // Tenant routes: require the gateway-supplied tenant header.
    let tenant = routes::tenant_router()
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::public_router())
        .merge(tenant)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
