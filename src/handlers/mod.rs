//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls into the services with the stores from `AppState`
//! 3. Returns the JSON envelope, or an `AppError` mapped to a status code

/// Store reachability probe
pub mod health;
/// Balance lookup and withdrawal endpoints
pub mod wallet;
