//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, audit and service wiring
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use campus_auth::Hs256SessionResolver;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
pub fn build_app(jwt_secret: &str, services: AppServices) -> Router {
    let services = Arc::new(services);
    let auth_state = middleware::AuthState {
        resolver: Arc::new(Hs256SessionResolver::new(jwt_secret.as_bytes())),
        roles: services.roles.clone(),
    };

    // Every route below sees a RequestSession; the guards decide access.
    let guarded = routes::router().layer(
        ServiceBuilder::new()
            .layer(Extension(Arc::clone(&services)))
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::session_middleware,
            )),
    );

    // Health sits outside the session layer but still reaches the database.
    Router::new()
        .route("/health", get(routes::system::health))
        .layer(Extension(services))
        .merge(guarded)
}
