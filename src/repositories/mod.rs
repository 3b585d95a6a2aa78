//! Ledger store access.
//!
//! The traits here are the seam between the wallet/idempotency services and the
//! relational store. Services receive a `&dyn LedgerStore` / `&dyn IdempotencyStore`
//! as arguments; nothing is held in globals.
//!
//! # Locking
//!
//! Balance mutation only happens through a [`LedgerTransaction`]:
//! [`LedgerTransaction::get_for_update`] takes an exclusive row lock that is held
//! until the transaction commits, rolls back, or is dropped. Reads through
//! [`AccountRepository::get`] never take that lock.

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    error::{AppError, StoreError},
    models::{
        account::Account,
        idempotency::IdempotencyRecord,
        transaction::{Movement, NewMovement},
    },
};

/// Unlocked account reads for query paths such as the balance lookup.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Read an account with the store's default read consistency.
    async fn get(&self, id: &str) -> Result<Option<Account>, StoreError>;
}

/// The relational store holding accounts and the movement log.
#[async_trait]
pub trait LedgerStore: AccountRepository {
    /// Open a store transaction.
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError>;

    /// Round trip to the store, used by the health check.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One open store transaction.
///
/// Dropping it without calling [`commit`](LedgerTransaction::commit) discards every
/// write made through it and releases its row locks. This is what makes a cancelled
/// or timed-out request leave no partial effect behind.
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read an account and hold an exclusive lock on its row until this transaction ends.
    ///
    /// Blocks while another transaction holds the same row.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: no row with this id
    /// - `Store`: query failed
    async fn get_for_update(&mut self, id: &str) -> Result<Account, AppError>;

    /// Write a new balance and refresh `updated_at`.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound`: zero rows matched
    /// - `Store`: query failed
    async fn update_balance(&mut self, id: &str, new_balance: Decimal) -> Result<(), AppError>;

    /// Append a movement record. Returns it with the store-assigned id and timestamp.
    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError>;

    /// Make every write of this transaction visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard every write of this transaction.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Storage for recorded responses, keyed by idempotency key.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Store a record unless one already exists for its key.
    ///
    /// Returns `false` when another writer got there first. Losing that race is not an error.
    async fn insert_if_absent(&self, record: &IdempotencyRecord) -> Result<bool, StoreError>;
}
