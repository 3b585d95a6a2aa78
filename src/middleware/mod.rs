//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can short-circuit a request
//! (replaying a recorded response) or post-process the handler's response.

/// Idempotency-Key replay middleware
pub mod idempotency;
