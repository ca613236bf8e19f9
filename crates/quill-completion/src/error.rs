// ABOUTME: Error types for the completion engine
// ABOUTME: Startup precondition failures and request construction errors

use quill_types::ServerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    #[error("Missing host collaborator: {collaborator}")]
    MissingCollaborator { collaborator: &'static str },

    #[error("Invalid completion configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Failed to encode {method} params: {message}")]
    EncodeParams {
        method: &'static str,
        message: String,
    },

    #[error("Server {server} is not attached to this buffer")]
    UnknownServer { server: ServerId },
}

pub type Result<T, E = CompletionError> = std::result::Result<T, E>;
