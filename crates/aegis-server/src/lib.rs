//! HTTP transport for the authorization-code and system-authorization
//! cores. Everything stateful lives in the library crates; this crate only
//! deserializes the wire formats, routes them into the services, and turns
//! their outcomes back into redirects and JSON bodies.

pub mod config;
pub mod flow;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use axum::extract::Extension;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/authorize", get(middleware::handlers::authorize))
        .route("/callback", get(middleware::handlers::callback))
        .route(
            "/internal/authorization-codes/{client_id}/{code}",
            get(middleware::handlers::get_authorization_code_details)
                .route_layer(axum::middleware::from_fn(middleware::auth::enforce_system_authorization)),
        )
        .route(
            "/internal/accessible-resources",
            get(middleware::handlers::get_accessible_resources)
                .route_layer(axum::middleware::from_fn(middleware::auth::attach_security_context)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": "aegis-server" }))
}
