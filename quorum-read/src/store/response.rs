//! The payload returned to the caller of a quorum read.

use std::fmt;

use bytes::Bytes;

use crate::store::status::StatusCode;

/// A single replica's response body plus the headers the caller cares about.
///
/// Wire decoding is the fan-out reader's concern; by the time a response
/// reaches the quorum engine it is already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    pub status: StatusCode,
    /// Correlation id assigned by the backend, kept for diagnostics.
    pub activity_id: String,
    pub body: Bytes,
}

impl StoreResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            activity_id: String::new(),
            body: body.into(),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.status.is_throttled()
    }
}

impl fmt::Display for StoreResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreResponse{{status:{}, body:{}B}}",
            self.status,
            self.body.len()
        )
    }
}
