//! In-process ledger store used by the test suite.
//!
//! Mirrors the PostgreSQL semantics the services rely on: a per-account async
//! lock stands in for `FOR UPDATE`, writes are staged inside the transaction and
//! applied under one mutex on commit, and dropping a transaction discards its
//! writes and releases its locks.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard, Semaphore};
use uuid::Uuid;

use super::{AccountRepository, IdempotencyStore, LedgerStore, LedgerTransaction};
use crate::{
    error::{AppError, StoreError},
    models::{
        account::Account,
        idempotency::IdempotencyRecord,
        transaction::{Movement, NewMovement},
    },
};

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    movements: Vec<Movement>,
    idempotency: HashMap<String, IdempotencyRecord>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<LedgerState>,
    row_locks: Mutex<HashMap<String, Arc<RowLock<()>>>>,
    unreachable: AtomicBool,
    fail_commits: AtomicBool,
    fail_idempotency_reads: AtomicBool,
    fail_idempotency_writes: AtomicBool,
    idempotency_write_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn row_lock(&self, id: &str) -> Arc<RowLock<()>> {
        self.row_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Shared handle to one in-process ledger. Clones see the same data.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Inner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision an account with the given opening balance.
    pub fn with_account(self, id: &str, name: &str, balance: Decimal) -> Self {
        let now = Utc::now();
        self.inner.state().accounts.insert(
            id.to_string(),
            Account {
                id: id.to_string(),
                name: name.to_string(),
                email: format!("{id}@example.com"),
                balance,
                created_at: now,
                updated_at: now,
            },
        );
        self
    }

    /// Committed balance of an account.
    pub fn balance(&self, id: &str) -> Option<Decimal> {
        self.inner.state().accounts.get(id).map(|a| a.balance)
    }

    /// Committed movements of an account, oldest first.
    pub fn movements(&self, id: &str) -> Vec<Movement> {
        self.inner
            .state()
            .movements
            .iter()
            .filter(|m| m.user_id == id)
            .cloned()
            .collect()
    }

    pub fn idempotency_record(&self, key: &str) -> Option<IdempotencyRecord> {
        self.inner.state().idempotency.get(key).cloned()
    }

    pub fn set_unreachable(&self, value: bool) {
        self.inner.unreachable.store(value, Ordering::SeqCst);
    }

    pub fn fail_commits(&self, value: bool) {
        self.inner.fail_commits.store(value, Ordering::SeqCst);
    }

    pub fn fail_idempotency_reads(&self, value: bool) {
        self.inner.fail_idempotency_reads.store(value, Ordering::SeqCst);
    }

    pub fn fail_idempotency_writes(&self, value: bool) {
        self.inner.fail_idempotency_writes.store(value, Ordering::SeqCst);
    }

    /// Hold every idempotency insert until the returned semaphore gets a permit.
    pub fn gate_idempotency_writes(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self
            .inner
            .idempotency_write_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl AccountRepository for MemoryLedger {
    async fn get(&self, id: &str) -> Result<Option<Account>, StoreError> {
        self.inner.check_reachable()?;
        Ok(self.inner.state().accounts.get(id).cloned())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn begin(&self) -> Result<Box<dyn LedgerTransaction>, StoreError> {
        self.inner.check_reachable()?;
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            locks: HashMap::new(),
            balances: HashMap::new(),
            movements: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.check_reachable()
    }
}

struct MemoryTransaction {
    inner: Arc<Inner>,
    locks: HashMap<String, OwnedMutexGuard<()>>,
    balances: HashMap<String, Decimal>,
    movements: Vec<Movement>,
}

impl MemoryTransaction {
    async fn lock_row(&mut self, id: &str) {
        if self.locks.contains_key(id) {
            return;
        }
        let guard = self.inner.row_lock(id).lock_owned().await;
        self.locks.insert(id.to_string(), guard);
    }

    /// Committed row with this transaction's own staged writes applied.
    fn visible_account(&self, id: &str) -> Option<Account> {
        let mut account = self.inner.state().accounts.get(id).cloned()?;
        if let Some(balance) = self.balances.get(id) {
            account.balance = *balance;
        }
        Some(account)
    }
}

#[async_trait]
impl LedgerTransaction for MemoryTransaction {
    async fn get_for_update(&mut self, id: &str) -> Result<Account, AppError> {
        self.lock_row(id).await;
        self.visible_account(id).ok_or(AppError::AccountNotFound)
    }

    async fn update_balance(&mut self, id: &str, new_balance: Decimal) -> Result<(), AppError> {
        // An UPDATE locks the row too
        self.lock_row(id).await;
        if self.visible_account(id).is_none() {
            return Err(AppError::AccountNotFound);
        }
        if new_balance < Decimal::ZERO {
            return Err(StoreError::Backend(format!("balance check violated for {id}")).into());
        }
        self.balances.insert(id.to_string(), new_balance);
        Ok(())
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<Movement, StoreError> {
        if self.visible_account(&movement.user_id).is_none() {
            return Err(StoreError::Backend(format!(
                "foreign key violated for {}",
                movement.user_id
            )));
        }
        let movement = Movement {
            id: Uuid::new_v4(),
            user_id: movement.user_id,
            kind: movement.kind,
            amount: movement.amount,
            balance_before: movement.balance_before,
            balance_after: movement.balance_after,
            description: movement.description,
            created_at: Utc::now(),
        };
        self.movements.push(movement.clone());
        Ok(movement)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.inner.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("commit failed".to_string()));
        }

        let MemoryTransaction {
            inner,
            locks,
            balances,
            movements,
        } = *self;

        {
            let mut state = inner.state();
            let now = Utc::now();
            for (id, balance) in balances {
                if let Some(account) = state.accounts.get_mut(&id) {
                    account.balance = balance;
                    account.updated_at = now;
                }
            }
            state.movements.extend(movements);
        }

        // Row locks are released only after the writes are visible
        drop(locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for MemoryLedger {
    async fn find(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        if self.inner.fail_idempotency_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("idempotency lookup failed".to_string()));
        }
        Ok(self.inner.state().idempotency.get(key).cloned())
    }

    async fn insert_if_absent(&self, record: &IdempotencyRecord) -> Result<bool, StoreError> {
        let gate = self
            .inner
            .idempotency_write_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| StoreError::Backend("idempotency gate closed".to_string()))?;
        }
        if self.inner.fail_idempotency_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("idempotency insert failed".to_string()));
        }
        let mut state = self.inner.state();
        if state.idempotency.contains_key(&record.key) {
            return Ok(false);
        }
        state.idempotency.insert(record.key.clone(), record.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::models::transaction::NewMovement;

    #[tokio::test]
    async fn row_lock_blocks_second_locker_until_commit() {
        let ledger = MemoryLedger::new().with_account("u1", "Alice", Decimal::new(100, 0));

        let mut first = ledger.begin().await.unwrap();
        let account = first.get_for_update("u1").await.unwrap();
        first
            .update_balance("u1", account.balance - Decimal::new(40, 0))
            .await
            .unwrap();

        let contender = ledger.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin().await.unwrap();
            let seen = second.get_for_update("u1").await.unwrap();
            second.rollback().await.unwrap();
            seen.balance
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        first.commit().await.unwrap();
        assert_eq!(waiter.await.unwrap(), Decimal::new(60, 0));
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes_and_releases_lock() {
        let ledger = MemoryLedger::new().with_account("u1", "Alice", Decimal::new(100, 0));

        {
            let mut tx = ledger.begin().await.unwrap();
            tx.get_for_update("u1").await.unwrap();
            tx.update_balance("u1", Decimal::ZERO).await.unwrap();
            tx.append_movement(NewMovement::withdraw(
                "u1",
                Decimal::new(100, 0),
                Decimal::new(100, 0),
                None,
            )
            .unwrap())
            .await
            .unwrap();
        }

        assert_eq!(ledger.balance("u1"), Some(Decimal::new(100, 0)));
        assert!(ledger.movements("u1").is_empty());

        let mut tx = tokio::time::timeout(Duration::from_secs(1), async {
            let mut tx = ledger.begin().await.unwrap();
            tx.get_for_update("u1").await.unwrap();
            tx
        })
        .await
        .expect("row lock was not released");
        tx.update_balance("u1", Decimal::new(1, 0)).await.unwrap();
    }

    #[tokio::test]
    async fn update_of_missing_row_reports_account_not_found() {
        let ledger = MemoryLedger::new();
        let mut tx = ledger.begin().await.unwrap();

        assert!(matches!(
            tx.update_balance("ghost", Decimal::ONE).await,
            Err(AppError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn first_idempotency_writer_wins() {
        let ledger = MemoryLedger::new();
        let first = IdempotencyRecord {
            key: "k1".to_string(),
            response_body: b"first".to_vec(),
            status_code: 200,
        };
        let second = IdempotencyRecord {
            response_body: b"second".to_vec(),
            ..first.clone()
        };

        assert!(ledger.insert_if_absent(&first).await.unwrap());
        assert!(!ledger.insert_if_absent(&second).await.unwrap());
        assert_eq!(ledger.find("k1").await.unwrap(), Some(first));
    }
}
