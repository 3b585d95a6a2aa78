//! Recorded responses used to replay retried requests.

/// Represents a row of the `idempotency_keys` table.
///
/// A key maps to at most one record. Records are written once and never
/// updated; expiry is left to whoever operates the database.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct IdempotencyRecord {
    /// Client-supplied `Idempotency-Key` header value
    pub key: String,

    /// Response body exactly as it was sent the first time
    pub response_body: Vec<u8>,

    pub status_code: i32,
}

/// A response captured from a downstream handler, or replayed from a record.
///
/// The body is opaque bytes; nothing here parses or validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RecordedResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    pub fn into_record(self, key: impl Into<String>) -> IdempotencyRecord {
        IdempotencyRecord {
            key: key.into(),
            response_body: self.body,
            status_code: i32::from(self.status),
        }
    }
}

impl From<IdempotencyRecord> for RecordedResponse {
    fn from(record: IdempotencyRecord) -> Self {
        Self {
            // Out-of-range codes can only come from manual edits; replay them as 500
            status: u16::try_from(record.status_code).unwrap_or(500),
            body: record.response_body,
        }
    }
}
