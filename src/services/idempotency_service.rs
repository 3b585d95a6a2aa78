//! Idempotent replay of mutating requests.
//!
//! A client that retries a request with the same idempotency key gets the
//! originally recorded status and body back, and the operation behind it is
//! not run a second time. Requests without a key are never recorded.
//!
//! The lookup and the later insert are not one atomic step: two concurrent
//! first requests with the same key can both run the operation. Each caller
//! gets its own result and whichever insert lands first is the one replayed
//! from then on.
//!
//! Once a keyed request misses the lookup, the operation and the recording run
//! on their own task. A caller that goes away (request timeout, client
//! disconnect) does not stop a committed withdrawal from being recorded.

use std::{future::Future, sync::Arc};

use crate::{
    error::AppError,
    models::idempotency::RecordedResponse,
    repositories::IdempotencyStore,
};

/// Run `operation` at most once per idempotency key.
///
/// Returns the response and whether it was replayed from the store.
///
/// - `key` is `None` or blank: run `operation`, record nothing.
/// - Recorded response exists: return it verbatim without running `operation`.
/// - Otherwise: run `operation` and record its response (first writer wins).
///   Server errors (5xx) are not recorded, since nothing was committed and a retry
///   must be allowed to run. A failure to record is logged and otherwise ignored.
///   The run and the recording are spawned together and finish even if the
///   returned future is dropped.
///
/// # Errors
///
/// - `Store`: the lookup failed. `operation` is not run, since its previous
///   outcome is unknown.
/// - `Internal`: the spawned run panicked or was aborted.
/// - Whatever `operation` itself returns as an error (nothing is recorded).
pub async fn execute_idempotent<F, Fut>(
    store: Arc<dyn IdempotencyStore>,
    key: Option<&str>,
    operation: F,
) -> Result<(RecordedResponse, bool), AppError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<RecordedResponse, AppError>> + Send + 'static,
{
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return Ok((operation().await?, false));
    };

    if let Some(record) = store.find(key).await? {
        tracing::info!(idempotency_key = key, "replaying recorded response");
        return Ok((record.into(), true));
    }

    let key = key.to_string();
    let task = tokio::spawn(async move {
        let response = operation().await?;
        record(store.as_ref(), &key, &response).await;
        Ok::<_, AppError>((response, false))
    });

    task.await
        .map_err(|err| AppError::Internal(format!("idempotent operation did not finish: {err}")))?
}

async fn record(store: &dyn IdempotencyStore, key: &str, response: &RecordedResponse) {
    if response.is_server_error() {
        tracing::warn!(
            idempotency_key = key,
            status = response.status,
            "not recording server error response"
        );
        return;
    }

    match store.insert_if_absent(&response.clone().into_record(key)).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!(
                idempotency_key = key,
                "concurrent request recorded this key first"
            );
        }
        Err(err) => {
            tracing::error!(idempotency_key = key, error = %err, "failed to record response");
        }
    }
}
