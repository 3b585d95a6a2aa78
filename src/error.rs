//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON envelopes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::response::ApiResponse;

/// Failure of the ledger store itself, as opposed to a business rule.
///
/// Callers should treat these as internal and possibly retryable. Details are
/// logged but never sent to clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Query, begin, or commit failed in PostgreSQL.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The account row matched no rows on write even though this transaction held its lock.
    #[error("account {0} disappeared while locked")]
    RowVanished(String),

    /// Failure injected by the in-process test store.
    #[cfg(test)]
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Store Errors**: anything the ledger store reports (connection, query, commit)
/// - **Resource Errors**: requested account does not exist
/// - **Business Logic Errors**: withdrawal would overdraw the account
/// - **Validation Errors**: non-positive amount, malformed body, blank user id
/// - **Internal Errors**: everything else that is the service's fault
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Store operation failed. Returns HTTP 500 with a generic message.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Amount is zero or negative. Returns HTTP 400.
    #[error("Amount must be greater than 0")]
    InvalidAmount,

    /// No account with the requested id. Returns HTTP 404.
    #[error("User not found")]
    AccountNotFound,

    /// Balance is lower than the requested amount. Returns HTTP 400.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// Request body or parameters are invalid. Returns HTTP 400.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Failure inside the service that is not a store error. Returns HTTP 500.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::Database(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidAmount
            | AppError::InsufficientBalance
            | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AccountNotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// All errors use the standard envelope:
/// ```json
/// {
///   "success": false,
///   "message": "Insufficient balance"
/// }
/// ```
///
/// Store errors collapse to `"Internal server error"` so driver messages never reach clients.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match self {
            AppError::Store(ref err) => {
                tracing::error!(error = %err, "request failed on ledger store");
                "Internal server error".to_string()
            }
            AppError::Internal(ref detail) => {
                tracing::error!(error = %detail, "request failed");
                "Internal server error".to_string()
            }
            AppError::InvalidRequest(ref msg) => msg.clone(),
            _ => self.to_string(),
        };

        (status, Json(ApiResponse::failure(message))).into_response()
    }
}
