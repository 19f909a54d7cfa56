//! Wire types for sync endpoints.
//!
//! Request and response bodies are the domain's `CatchupRequest` and
//! `CatchupResponse`, which already carry their camelCase serde shape.

use serde::Serialize;

pub use crate::domain::sync::{CatchupRequest, CatchupResponse, ScopeChanges};

/// Standard error response body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}
