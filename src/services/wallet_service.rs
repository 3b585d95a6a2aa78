//! Wallet service - balance lookup and the withdrawal engine.
//!
//! # Atomicity Guarantees
//!
//! A withdrawal is one store transaction: lock the account row, check the
//! balance, write the new balance, append the movement record, commit. Either
//! the debit and its ledger entry both become visible or neither does.
//!
//! # Concurrency
//!
//! Withdrawals on the same account are serialized by the row lock taken in
//! `get_for_update`; the balance used for the decision is always read under
//! that lock. Withdrawals on different accounts never wait on each other.

use crate::{
    error::{AppError, StoreError},
    models::{
        account::BalanceResponse,
        transaction::{NewMovement, WithdrawRequest, WithdrawResponse},
    },
    repositories::{LedgerStore, LedgerTransaction},
};

/// Look up the current balance of an account.
///
/// Unlocked read; a concurrent withdrawal may commit right after it.
///
/// # Errors
///
/// - `InvalidRequest`: blank user id
/// - `AccountNotFound`: no such account
/// - `Store`: lookup failed
pub async fn get_balance(
    store: &dyn LedgerStore,
    user_id: &str,
) -> Result<BalanceResponse, AppError> {
    ensure_user_id(user_id)?;

    let account = store
        .get(user_id)
        .await?
        .ok_or(AppError::AccountNotFound)?;

    Ok(account.into())
}

/// Debit `request.amount` from an account and record a `WITHDRAW` movement.
///
/// # Process
///
/// 1. Validate amount and user id (no store access on failure)
/// 2. Begin store transaction
/// 3. Lock the account row and read its balance
/// 4. Reject if the balance is lower than the amount
/// 5. Write the new balance
/// 6. Append the movement record
/// 7. Commit
///
/// Any failure after step 2 rolls the transaction back. Nothing is retried here.
/// If the returned future is dropped before commit, the open transaction is
/// dropped with it and rolled back.
///
/// # Errors
///
/// - `InvalidAmount`: amount is zero or negative
/// - `InvalidRequest`: blank user id
/// - `AccountNotFound`: no such account
/// - `InsufficientBalance`: balance < amount
/// - `Store`: begin, query, write, or commit failed
pub async fn withdraw(
    store: &dyn LedgerStore,
    user_id: &str,
    request: WithdrawRequest,
) -> Result<WithdrawResponse, AppError> {
    request.validate()?;
    ensure_user_id(user_id)?;

    tracing::info!(user_id, amount = %request.amount, "processing withdrawal");

    let mut tx = store.begin().await.map_err(|err| {
        tracing::error!(user_id, error = %err, "failed to begin withdrawal transaction");
        AppError::from(err)
    })?;

    match debit(tx.as_mut(), user_id, request).await {
        Ok(response) => {
            if let Err(err) = tx.commit().await {
                tracing::error!(user_id, error = %err, "failed to commit withdrawal");
                return Err(err.into());
            }

            tracing::info!(
                user_id,
                transaction_id = %response.transaction_id,
                balance_after = %response.balance_after,
                "withdrawal committed"
            );
            Ok(response)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(user_id, error = %rollback_err, "failed to roll back withdrawal");
            }
            Err(err)
        }
    }
}

/// Steps 3-6 of a withdrawal, inside an open transaction.
async fn debit(
    tx: &mut dyn LedgerTransaction,
    user_id: &str,
    request: WithdrawRequest,
) -> Result<WithdrawResponse, AppError> {
    let account = tx.get_for_update(user_id).await.inspect_err(|err| {
        tracing::warn!(user_id, error = %err, "failed to lock account");
    })?;

    // Checked only after the lock is held
    if account.balance < request.amount {
        tracing::warn!(
            user_id,
            balance = %account.balance,
            amount = %request.amount,
            "insufficient balance"
        );
        return Err(AppError::InsufficientBalance);
    }

    let movement = NewMovement::withdraw(
        user_id,
        request.amount,
        account.balance,
        request.description,
    )?;

    tx.update_balance(user_id, movement.balance_after)
        .await
        .map_err(|err| match err {
            // The row is locked by us, so a zero-row update is a store fault, not a client error
            AppError::AccountNotFound => {
                AppError::Store(StoreError::RowVanished(user_id.to_string()))
            }
            other => other,
        })
        .inspect_err(|err| {
            tracing::error!(user_id, error = %err, "failed to update balance");
        })?;

    let saved = tx.append_movement(movement).await.inspect_err(|err| {
        tracing::error!(user_id, error = %err, "failed to append movement record");
    })?;

    Ok(saved.into())
}

fn ensure_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::InvalidRequest("user_id is required".to_string()));
    }
    Ok(())
}
