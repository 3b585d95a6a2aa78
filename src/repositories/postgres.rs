//! PostgreSQL implementation of the ledger and idempotency stores.
//!
//! Row locks come from `SELECT ... FOR UPDATE`. A `sqlx::Transaction` that is
//! dropped without commit is rolled back when its connection returns to the pool.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use super::{AccountRepository, IdempotencyStore, LedgerStore, LedgerTransaction};
use crate::{
    db::DbPool,
    error::{AppError, StoreError},
    models::{
        account::Account,
        idempotency::IdempotencyRecord,
        transaction::{Movement, NewMovement},
    },
};

/// Ledger store backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: DbPool,
}

impl PgLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PgLedgerStore {
    async fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, email, balance, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// An open PostgreSQL transaction holding one pooled connection.
struct PgLedgerTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn get_for_update(&mut self, id: &str) -> Result<Account, AppError> {
        // FOR UPDATE blocks other lockers of this row until we commit or roll back
        let account = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, name, email, balance, created_at, updated_at
            FROM users
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(AppError::AccountNotFound)?;

        Ok(account)
    }

    async fn update_balance(&mut self, id: &str, new_balance: Decimal) -> Result<(), AppError> {
        let updated_count = sqlx::query(
            r#"
            UPDATE users
            SET balance = $1,
                updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(new_balance)
        .bind(id)
        .execute(&mut *self.tx)
        .await?
        .rows_affected();

        if updated_count == 0 {
            return Err(AppError::AccountNotFound);
        }

        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        let movement = sqlx::query_as::<_, Movement>(
            r#"
            INSERT INTO transactions (
                user_id,
                type,
                amount,
                balance_before,
                balance_after,
                description
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, type, amount, balance_before, balance_after, description, created_at
            "#,
        )
        .bind(movement.user_id)
        .bind(movement.kind.as_str())
        .bind(movement.amount)
        .bind(movement.balance_before)
        .bind(movement.balance_after)
        .bind(movement.description)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(movement)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgLedgerTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let PgLedgerTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for PgLedgerStore {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let record = sqlx::query_as::<_, IdempotencyRecord>(
            "SELECT key, response_body, status_code FROM idempotency_keys WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_if_absent(&self, record: &IdempotencyRecord) -> Result<bool, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, response_body, status_code)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(&record.key)
        .bind(&record.response_body)
        .bind(record.status_code)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }
}
