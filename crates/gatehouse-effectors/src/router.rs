//! Router construction for the three effector services.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::EffectorState;

pub fn status_router(state: EffectorState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/change_status", post(handlers::status::change_status));
    with_layers(routes, state)
}

pub fn identity_router(state: EffectorState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/v1/change_identity",
            post(handlers::identity::change_identity),
        );
    with_layers(routes, state)
}

pub fn access_router(state: EffectorState) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/v1/change_access", post(handlers::access::change_access));
    with_layers(routes, state)
}

// Layers must wrap the fully-assembled route set.
fn with_layers(routes: Router, state: EffectorState) -> Router {
    routes
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}
