pub mod health;
pub mod requests;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Requests (guests may submit)
        .route(
            "/requests",
            post(requests::create_request).get(requests::list_requests),
        )
        .route(
            "/requests/:request_id",
            get(requests::get_request).delete(requests::delete_request),
        )
        .route(
            "/requests/:request_id/vendor-items",
            get(requests::get_vendor_items),
        )
        .route(
            "/requests/:request_id/responses",
            post(requests::submit_response),
        )
        .route(
            "/requests/:request_id/status",
            patch(requests::update_status),
        )
}
