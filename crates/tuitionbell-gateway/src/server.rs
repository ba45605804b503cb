//! HTTP server implementation using Axum.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use tuitionbell_core::config::ServerConfig;
use tuitionbell_notify::NotificationEngine;

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    /// Same engine the daily scheduler drives, so HTTP and cron runs serialize.
    pub engine: Arc<NotificationEngine>,
}

/// Build the Axum router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(super::routes::health_check))
        .route("/send-notifications", post(super::routes::send_notifications))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server. Returns once Ctrl-C is received.
pub async fn start(config: &ServerConfig, engine: Arc<NotificationEngine>) -> anyhow::Result<()> {
    let app = build_router(AppState { engine });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 Gateway server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("👋 Shutting down gateway");
        })
        .await?;
    Ok(())
}
