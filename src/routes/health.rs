use std::collections::BTreeMap;

use axum::{Router, extract::State, response::Json, routing::get};
use serde::Serialize;
use serde_json::json;

use crate::error::respond;
use crate::server::AppState;
use crate::types::{Envelope, HealthStatus};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Liveness check.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/ping`
///
/// # Response Format
/// ```json
/// { "status": "pong" }
/// ```
///
/// Does not touch storage; use `/api/health` for that.
pub async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "pong" }))
}

/// Health check endpoint handler.
///
/// Reports `healthy` when the storage backend answers, `degraded` otherwise.
/// Always 200 so load balancers can tell a slow database from a dead process.
///
/// # Route
/// - **Method**: GET
/// - **Path**: `/api/health`
///
/// # Examples
/// ```bash
/// curl http://localhost:5000/api/health
/// ```
pub async fn health(State(state): State<AppState>) -> Json<Envelope<HealthStatus>> {
    let status = match state.store.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Storage health check failed: {}", e);
            "degraded"
        }
    };
    respond(
        HealthStatus {
            status: status.to_string(),
            version: VERSION.to_string(),
            storage: state.store.backend().to_string(),
        },
        "Attendance API is running",
    )
}

#[derive(Debug, Serialize)]
pub struct ApiIndex {
    pub name: &'static str,
    pub version: &'static str,
    pub endpoints: BTreeMap<&'static str, &'static str>,
}

pub async fn index() -> Json<Envelope<ApiIndex>> {
    let endpoints = BTreeMap::from([
        ("auth", "/api/auth"),
        ("attendance", "/api/attendance"),
        ("classes", "/api/classes"),
        ("dashboard", "/api/dashboard"),
        ("students", "/api/students"),
        ("faculty", "/api/faculty"),
        ("analytics", "/api/analytics"),
        ("reports", "/api/reports"),
        ("health", "/api/health"),
    ]);
    respond(
        ApiIndex {
            name: "Attendify API",
            version: VERSION,
            endpoints,
        },
        "Welcome to Attendify API",
    )
}

/// Routes reachable without a token.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/ping", get(ping))
        .route("/api/health", get(health))
}
