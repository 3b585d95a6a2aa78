//! Data models representing database entities and API payloads.

/// Wallet account model
pub mod account;
/// Recorded responses for idempotent replay
pub mod idempotency;
/// Standard JSON envelope
pub mod response;
/// Ledger movement (transaction log) model
pub mod transaction;
