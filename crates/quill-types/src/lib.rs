// ABOUTME: Pure data types with no cross-crate dependencies
// ABOUTME: Foundation layer for all other quill crates

pub mod completion;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use completion::{
    CompletionPayload, CompletionTrigger, Cursor, NormalizedMatch, OffsetEncoding, ServerId,
    kind_name,
};
pub use config::{AttachOptions, CompletionConfig};
pub use error::ResponseError;

/// Re-export of the protocol types the completion data model is built on
pub use lsp_types as lsp;
