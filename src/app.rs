use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::JwtKeys;
use crate::config::Settings;
use crate::middleware::request_id::{request_id_layer, X_REQUEST_ID};
use crate::routes;
use crate::services::RequestService;

/// Upper bound for a submitted cart or quote body
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub requests: RequestService,
    pub settings: Settings,
    pub jwt: JwtKeys,
}

impl AppState {
    pub fn new(requests: RequestService, settings: Settings, jwt: JwtKeys) -> Arc<Self> {
        Arc::new(Self {
            requests,
            settings,
            jwt,
        })
    }
}

/// Router with the request API and its middleware stack
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // Every span carries the request id so lifecycle logs can be joined to
    // the HTTP exchange that caused them.
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(X_REQUEST_ID)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::debug_span!(
                "http",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let (set_request_id, propagate_request_id) = request_id_layer();

    // Layers run outermost last: the id is set before the trace span opens.
    Router::new()
        .merge(routes::api_router())
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

/// Browser access for the buyer, vendor and admin panels
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        Duration::from_secs(24 * 60 * 60)
    } else {
        Duration::from_secs(60 * 60)
    };

    // Exactly the methods the request routes use
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(X_REQUEST_ID),
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
