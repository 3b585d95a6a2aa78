//! Account data models and API response types.
//!
//! This module defines:
//! - `Account`: Database entity representing a wallet account
//! - `BalanceResponse`: Response body for the balance lookup

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `users` table. Accounts are provisioned outside this service;
/// here they are only read and debited through the locked update path.
///
/// # Balance Storage
///
/// Balances are `NUMERIC` in PostgreSQL and `Decimal` here, so comparisons and
/// subtraction are exact. Must be >= 0 (enforced by database CHECK constraint).
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize)]
pub struct Account {
    /// Opaque account identifier
    pub id: String,

    /// Display name of the account holder
    pub name: String,

    pub email: String,

    /// Current balance
    pub balance: Decimal,

    pub created_at: DateTime<Utc>,

    /// Timestamp of the last balance change
    pub updated_at: DateTime<Utc>,
}

/// Response body for `GET /api/v1/users/{user_id}/balance`.
///
/// # JSON Example
///
/// ```json
/// {
///   "user_id": "u1",
///   "name": "Alice",
///   "balance": "100.00",
///   "last_updated": "2025-12-20T10:00:00Z"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub name: String,
    pub balance: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl From<Account> for BalanceResponse {
    fn from(account: Account) -> Self {
        Self {
            user_id: account.id,
            name: account.name,
            balance: account.balance,
            last_updated: account.updated_at,
        }
    }
}
