//! API route handlers for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

use tuitionbell_core::NotificationRunResult;
use tuitionbell_notify::reference_at;

use super::server::AppState;

/// Error body for a run that aborted: `{"detail": "..."}` with status 500.
#[derive(Debug)]
pub struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": self.0 })),
        )
            .into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunParams {
    /// Classify against this day instead of today.
    pub date: Option<NaiveDate>,
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Run the notification engine once and return every outcome.
pub async fn send_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunParams>,
) -> Result<Json<NotificationRunResult>, ApiError> {
    tracing::info!("📣 Notification run requested over HTTP");
    let engine = state.engine.clone();

    // Detached so a dropped connection can't stop a run halfway through.
    let run = tokio::spawn(async move {
        match params.date {
            Some(date) => engine.run(reference_at(date)).await,
            None => engine.run_now().await,
        }
    });

    match run.await {
        Ok(Ok(result)) => Ok(Json(result)),
        Ok(Err(e)) => {
            tracing::error!("❌ Notification run failed: {e}");
            Err(ApiError(e.to_string()))
        }
        Err(e) => {
            tracing::error!("❌ Notification run panicked: {e}");
            Err(ApiError(format!("Notification run aborted: {e}")))
        }
    }
}
