//! Liveness and readiness

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::compare::MAX_COMPARE_ITEMS;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the catalog database can't be queried
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    pub catalog: bool,
    pub compare_items: usize,
    pub compare_capacity: usize,
}

/// GET /health
///
/// Answers 503 while the catalog is unreachable; the compared set is held in
/// memory and is reported either way.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let catalog = match sqlx::query("SELECT 1").execute(state.catalog.pool()).await {
        Ok(_) => true,
        Err(e) => {
            warn!("Health check: catalog unreachable: {}", e);
            false
        }
    };
    let compare_items = state.compare.lock().await.store.len();

    let status = if catalog {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if catalog { "ok" } else { "degraded" },
            module: "keybed-sf",
            version: env!("CARGO_PKG_VERSION"),
            catalog,
            compare_items,
            compare_capacity: MAX_COMPARE_ITEMS,
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
