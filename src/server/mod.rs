//! HTTP server
//!
//! Serves the planning workflow and target submission endpoints. Every
//! response carries permissive CORS headers and the standard envelope:
//! `{"success": true, ...}` on 200, `{"success": false, "error": ...}`
//! on 500.

mod routes;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::response::Response;
use axum::routing::post;
use eyre::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::store::TargetManager;
use crate::workflow::WorkflowEngine;

/// Shared state for request handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub targets: TargetManager,
    pub working_days: u32,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/plan", post(routes::handle_plan).options(routes::preflight))
        .route("/api/targets", post(routes::handle_targets).options(routes::preflight))
        .layer(axum::middleware::map_response(apply_cors))
        .with_state(state)
}

/// Bind and serve until the task is cancelled
pub async fn serve(config: &Config, engine: Arc<WorkflowEngine>, targets: TargetManager) -> Result<()> {
    let state = AppState {
        engine,
        targets,
        working_days: config.targets.working_days,
    };

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind {addr}"))?;
    info!(%addr, "serve: listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")
}

/// Browser callers come from another origin, so every response (including
/// the automatic 405 for wrong methods) carries CORS headers.
async fn apply_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[allow(unused_imports)]
pub use routes::{PlanRequest, TargetsRequest};
