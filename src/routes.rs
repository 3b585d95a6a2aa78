//! HTTP router and shared handler state.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    handlers, middleware,
    repositories::{IdempotencyStore, LedgerStore},
};

/// Stores shared with every handler via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn LedgerStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
}

impl AppState {
    /// Use one backend for both the ledger and recorded responses.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: LedgerStore + IdempotencyStore + 'static,
    {
        Self {
            ledger: store.clone(),
            idempotency: store,
        }
    }
}

/// Build the application router.
///
/// Only the withdraw route sits behind the idempotency middleware. Requests
/// that run longer than `request_timeout` are answered with 408 and their
/// handler future is dropped.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let mutating_routes = Router::new()
        .route(
            "/api/v1/users/{user_id}/withdraw",
            post(handlers::wallet::withdraw),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::idempotency::idempotency_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/users/{user_id}/balance",
            get(handlers::wallet::get_balance),
        )
        .merge(mutating_routes)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
