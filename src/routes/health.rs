use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub storage: String,
}

/// Health check endpoint - public
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.requests.store().health_check().await;

    let (status, status_code) = match &storage {
        Ok(()) => ("healthy", StatusCode::OK),
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                storage: if storage.is_ok() { "ok" } else { "error" }.to_string(),
            },
        }),
    )
}
