//! Idempotency-Key middleware.
//!
//! Wraps mutating routes so a client retry carrying the same `Idempotency-Key`
//! header gets the first response replayed instead of running the handler again.

use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError, models::idempotency::RecordedResponse, routes::AppState,
    services::idempotency_service,
};

/// Request header carrying the client's replay key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Set to `true` on responses that were replayed from a record.
pub const IDEMPOTENCY_HIT_HEADER: &str = "x-idempotency-hit";

/// Largest response body that will be buffered for recording.
const MAX_RECORDED_BODY_BYTES: usize = 1024 * 1024;

/// Idempotency middleware function.
///
/// # Flow
///
/// 1. Read the `Idempotency-Key` header (absent or blank: no recording)
/// 2. If a response was recorded for the key, return it with `X-Idempotency-Hit: true`
/// 3. Otherwise run the handler, buffer its response, record it, and return it.
///    The handler runs on its own task, so it completes and gets recorded even
///    when this request is timed out or the client disconnects.
///
/// # Errors
///
/// - `InvalidRequest`: header is present but not valid ASCII text
/// - `Store`: the recorded-response lookup failed (the handler is not run)
/// - `Internal`: the handler's response body could not be buffered
pub async fn idempotency_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| value.to_str().map(str::to_string))
        .transpose()
        .map_err(|_| AppError::InvalidRequest("Invalid Idempotency-Key header".to_string()))?;

    let (recorded, from_cache) = idempotency_service::execute_idempotent(
        Arc::clone(&state.idempotency),
        key.as_deref(),
        move || async move { capture(next.run(request).await).await },
    )
    .await?;

    Ok(replay(recorded, from_cache))
}

/// Buffer a downstream response into a recordable form.
async fn capture(response: Response) -> Result<RecordedResponse, AppError> {
    let status = response.status().as_u16();
    let body = to_bytes(response.into_body(), MAX_RECORDED_BODY_BYTES)
        .await
        .map_err(|err| AppError::Internal(format!("failed to buffer response body: {err}")))?;

    Ok(RecordedResponse::new(status, body.to_vec()))
}

fn replay(recorded: RecordedResponse, from_cache: bool) -> Response {
    let status =
        StatusCode::from_u16(recorded.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        recorded.body,
    )
        .into_response();

    if from_cache {
        response
            .headers_mut()
            .insert(IDEMPOTENCY_HIT_HEADER, HeaderValue::from_static("true"));
    }

    response
}
