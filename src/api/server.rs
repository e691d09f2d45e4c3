//! HTTP server wiring

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::config::Config;
use crate::error::Result;
use crate::jobs::JobManager;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobManager,
    pub config: Arc<Config>,
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_mb.saturating_mul(1024 * 1024);

    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        .route("/jobs/:id", get(handlers::job_status))
        .route("/jobs/:id/subtitles", get(handlers::download_subtitles))
        .route("/jobs/:id/video", get(handlers::download_video))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bind to the configured address and serve until the process exits
pub async fn start_http_server(state: AppState) -> Result<()> {
    let address = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
