//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They take their stores as arguments and own transaction management.

pub mod idempotency_service;
pub mod wallet_service;
