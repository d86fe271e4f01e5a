//! # bloodnet-api: Axum API Service
//!
//! The HTTP service for BloodNet, built on Axum/Tower/Tokio. Assembles the
//! resource routers into a single application with shared middleware for
//! authentication, tracing and metrics.
//!
//! ## Routers
//!
//! - `/api/auth/*`: registration, login, profile
//! - `/api/users/*`: user management and directories
//! - `/api/inventory/*`: hospital stock ledger
//! - `/api/donations/*`: donation recording
//! - `/api/requests/*`: emergency requests
//! - `/health/*`: liveness, readiness and counters (unauthenticated)
//! - `/openapi.json`: generated API description (unauthenticated)
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → MetricsLayer → AuthLayer (protected routes only)
//!
//! ## Crate Policy
//!
//! - Domain rules live in `bloodnet-state`; handlers parse, authorize and
//!   delegate. Workflows touching several records live in [`orchestration`].
//! - All errors map to structured HTTP responses via [`AppError`].

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod orchestration;
pub mod response;
pub mod routes;
pub mod state;
pub mod views;

use axum::extract::State;
use axum::http::Uri;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::{Extension, Json, Router};

use crate::middleware::metrics::{metrics_middleware, MetricsSnapshot};
use crate::middleware::tracing_layer;

pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes, registration, login, stock search and the OpenAPI document
/// are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .merge(routes::auth::router())
        .merge(routes::users::router())
        .merge(routes::inventory::router())
        .merge(routes::donations::router())
        .merge(routes::requests::router())
        .route_layer(from_fn_with_state(state.clone(), auth::auth_middleware));

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/health/metrics", get(metrics))
        .merge(routes::auth::public_router())
        .merge(routes::inventory::public_router())
        .merge(openapi::router());

    Router::new()
        .merge(public)
        .merge(protected)
        .fallback(route_not_found)
        .layer(from_fn(metrics_middleware))
        .layer(tracing_layer::layer())
        .layer(Extension(state.metrics.clone()))
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("Route {} not found", uri.path()))
}
