//! Health check endpoint for service monitoring.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{models::response::ApiResponse, routes::AppState};

/// Health check payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Ledger store connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "success": true,
///   "message": "Service is healthy",
///   "data": {
///     "status": "healthy",
///     "database": "connected",
///     "timestamp": "2025-12-21T19:00:00Z"
///   }
/// }
/// ```
///
/// # Response (503 Service Unavailable)
///
/// Returned when the ledger store does not answer a round trip.
pub async fn health_check(State(state): State<AppState>) -> Response {
    match state.ledger.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                "Service is healthy",
                HealthResponse {
                    status: "healthy".to_string(),
                    database: "connected".to_string(),
                    timestamp: Utc::now(),
                },
            )),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure("Database connection failed")),
            )
                .into_response()
        }
    }
}
