// ABOUTME: LSP completion front-end for a single editor buffer
// ABOUTME: Debounced requests, multi-server merging, acceptance and signature help

pub mod accept;
pub mod binding;
pub mod boundary;
mod cancel;
pub mod capabilities;
pub mod commands;
mod context;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod host;
pub mod latency;
pub mod merge;
mod message;
pub mod normalize;
pub mod position;
mod report;
pub mod signature_help;
pub mod snippet;
mod timer;

#[cfg(test)]
mod mock;

pub use binding::ClientBinding;
pub use capabilities::client_capabilities;
pub use commands::{CommandHandler, CommandRegistry, FollowUp};
pub use engine::{CompletionEngine, CompletionEngineBuilder, OrchestratorState};
pub use error::{CompletionError, Result};
pub use fuzzy::{FuzzyMatcher, NucleoMatcher};
pub use host::{
    BufferMode, Notifier, NotifyLevel, Popup, RequestHandle, ResponseCallback, SignatureHelpView,
    SnippetEngine, TextBuffer, Transport,
};
pub use latency::LatencyEstimator;
pub use merge::{MergeRequest, MergedCompletions, merge_responses};
pub use message::EngineMessage;
pub use snippet::escape_snippet_text;

pub use quill_events::completion::{CancellationReason, CompletionRequestId, Event};
pub use quill_types::{
    AttachOptions, CompletionConfig, CompletionPayload, CompletionTrigger, Cursor,
    NormalizedMatch, OffsetEncoding, ResponseError, ServerId,
};
