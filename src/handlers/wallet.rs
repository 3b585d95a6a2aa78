//! Wallet HTTP handlers.
//!
//! This module implements the wallet API endpoints:
//! - GET /api/v1/users/{user_id}/balance - Current balance
//! - POST /api/v1/users/{user_id}/withdraw - Debit the balance

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};

use crate::{
    error::AppError,
    models::{
        account::BalanceResponse,
        response::ApiResponse,
        transaction::{WithdrawRequest, WithdrawResponse},
    },
    routes::AppState,
    services::wallet_service,
};

/// Get the balance of an account.
///
/// # Response
///
/// - **Success (200 OK)**: `{user_id, name, balance, last_updated}` in `data`
/// - **Error (404)**: Unknown user
pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<BalanceResponse>>, AppError> {
    let balance = wallet_service::get_balance(state.ledger.as_ref(), &user_id).await?;

    Ok(Json(ApiResponse::success(
        "Balance retrieved successfully",
        balance,
    )))
}

/// Withdraw from an account.
///
/// # Request Body
///
/// ```json
/// {
///   "amount": 30,
///   "description": "coffee"
/// }
/// ```
///
/// Optional header `Idempotency-Key` (handled by the idempotency middleware).
///
/// # Response
///
/// - **Success (200 OK)**: `{transaction_id, user_id, amount, balance_before, balance_after, created_at}`
/// - **Error (400)**: Malformed body, non-positive amount, or insufficient balance
/// - **Error (404)**: Unknown user
/// - **Error (500)**: Store failure
pub async fn withdraw(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<WithdrawResponse>>, AppError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected withdraw body");
        AppError::InvalidRequest("Invalid request body".to_string())
    })?;

    let result = wallet_service::withdraw(state.ledger.as_ref(), &user_id, request).await?;

    Ok(Json(ApiResponse::success("Withdrawal successful", result)))
}
