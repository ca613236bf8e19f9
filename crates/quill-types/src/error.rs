// ABOUTME: Error payload returned by a language server for a failed request
// ABOUTME: Mirrors the JSON-RPC error object as a typed error

use serde::{Deserialize, Serialize};

/// JSON-RPC error reported by a server, or synthesized by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
}

impl ResponseError {
    /// `RequestCancelled` from the LSP error code table
    pub const REQUEST_CANCELLED: i64 = -32800;

    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == Self::REQUEST_CANCELLED
    }
}
