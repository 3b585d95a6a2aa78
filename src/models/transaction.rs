//! Ledger movement models and withdrawal request/response types.
//!
//! This module defines:
//! - `Movement`: Database entity for one completed balance change
//! - `NewMovement`: A movement about to be appended inside a store transaction
//! - `WithdrawRequest` / `WithdrawResponse`: API bodies for the withdraw endpoint

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Decimal places money is kept at, matching the `NUMERIC(20, 2)` columns.
pub const MONEY_SCALE: u32 = 2;

/// Direction of a balance change.
///
/// Stored as `'WITHDRAW'` / `'DEPOSIT'` in the `transactions.type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Withdraw,
    Deposit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Withdraw => "WITHDRAW",
            MovementKind::Deposit => "DEPOSIT",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown movement type: {0}")]
pub struct UnknownMovementKind(String);

impl TryFrom<String> for MovementKind {
    type Error = UnknownMovementKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "WITHDRAW" => Ok(MovementKind::Withdraw),
            "DEPOSIT" => Ok(MovementKind::Deposit),
            _ => Err(UnknownMovementKind(value)),
        }
    }
}

/// Represents a row of the `transactions` table.
///
/// Movements are append-only: they are written once in the same store transaction
/// as the balance change they document and never updated or deleted afterwards.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Movement {
    /// Assigned by the store on insert
    pub id: Uuid,

    pub user_id: String,

    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub kind: MovementKind,

    /// Always positive
    pub amount: Decimal,

    pub balance_before: Decimal,

    /// Account balance at the moment this row was appended
    pub balance_after: Decimal,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// A movement that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub user_id: String,
    pub kind: MovementKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub description: Option<String>,
}

impl NewMovement {
    /// Describe a debit of `amount` from a balance of `balance_before`.
    ///
    /// Blank descriptions are stored as NULL.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` if the subtraction overflows or cannot be represented
    /// exactly (`Decimal` rounds silently past 28 significant digits).
    pub fn withdraw(
        user_id: impl Into<String>,
        amount: Decimal,
        balance_before: Decimal,
        description: Option<String>,
    ) -> Result<Self, AppError> {
        let balance_after = balance_before
            .checked_sub(amount)
            .filter(|after| {
                after.checked_add(amount) == Some(balance_before)
                    && balance_before.checked_sub(*after) == Some(amount)
            })
            .ok_or(AppError::InvalidAmount)?;

        Ok(Self {
            user_id: user_id.into(),
            kind: MovementKind::Withdraw,
            amount,
            balance_before,
            balance_after,
            description: description.filter(|d| !d.trim().is_empty()),
        })
    }
}

/// Request body for `POST /api/v1/users/{user_id}/withdraw`.
///
/// # JSON Example
///
/// ```json
/// {
///   "amount": 30,
///   "description": "coffee"
/// }
/// ```
///
/// `amount` may be a JSON number or a numeric string. Numbers are read from their
/// literal digits (`serde_json`'s arbitrary precision mode), not through `f64`.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    #[serde(deserialize_with = "rust_decimal::serde::arbitrary_precision::deserialize")]
    pub amount: Decimal,

    #[serde(default)]
    pub description: Option<String>,
}

impl WithdrawRequest {
    /// Reject non-positive amounts, and amounts finer than [`MONEY_SCALE`],
    /// before any store access.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.amount <= Decimal::ZERO || self.amount.normalize().scale() > MONEY_SCALE {
            return Err(AppError::InvalidAmount);
        }
        Ok(())
    }
}

/// Response body for a successful withdrawal.
///
/// # JSON Example
///
/// ```json
/// {
///   "transaction_id": "770e8400-e29b-41d4-a716-446655440002",
///   "user_id": "u1",
///   "amount": "30",
///   "balance_before": "100.00",
///   "balance_after": "70.00",
///   "created_at": "2025-12-21T16:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawResponse {
    pub transaction_id: Uuid,
    pub user_id: String,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Movement> for WithdrawResponse {
    fn from(movement: Movement) -> Self {
        Self {
            transaction_id: movement.id,
            user_id: movement.user_id,
            amount: movement.amount,
            balance_before: movement.balance_before,
            balance_after: movement.balance_after,
            created_at: movement.created_at,
        }
    }
}
