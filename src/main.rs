use anyhow::Result;
use std::time::Duration;

use rfq_backend::{
    app, auth, config, logging,
    services::{GuestVisibility, RequestService, RetryPolicy},
    store,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = config::Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        storage = ?settings.storage_backend,
        "Starting RFQ backend"
    );

    // Open the request store
    let store = store::connect(&settings).await?;
    if let Err(e) = store.health_check().await {
        tracing::warn!(error = %e, "Request store is not healthy at startup");
    }

    let retry = RetryPolicy {
        max_elapsed: Duration::from_millis(settings.write_retry_max_elapsed_ms),
        ..RetryPolicy::default()
    };
    let requests = RequestService::new(store)
        .with_guest_visibility(GuestVisibility::from_flag(
            settings.guest_requests_visible_to_buyers,
        ))
        .with_retry_policy(retry);

    let jwt = auth::JwtKeys::new(&settings.jwt_secret);

    // Create application state
    let state = app::AppState::new(requests, settings.clone(), jwt);

    // Build application
    let app = app::create_app(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
