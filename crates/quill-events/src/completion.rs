// ABOUTME: Completion domain events for request lifecycle and user interactions
// ABOUTME: Immutable facts published by the engine to interested subscribers

use quill_types::{CompletionTrigger, Cursor, ResponseError, ServerId};

/// Completion domain events
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A request cycle was dispatched to one or more servers
    Requested {
        request_id: CompletionRequestId,
        trigger: CompletionTrigger,
        cursor: Cursor,
        servers: Vec<ServerId>,
    },

    Cancelled {
        request_id: CompletionRequestId,
        reason: CancellationReason,
    },

    /// Merged results were handed to the popup
    ResultsShown {
        request_id: CompletionRequestId,
        start_column: usize,
        item_count: usize,
        is_incomplete: bool,
        latency_ms: u64,
    },

    RequestFailed {
        request_id: CompletionRequestId,
        server: ServerId,
        error: ResponseError,
    },

    ItemAccepted {
        server: ServerId,
        label: String,
        expanded_snippet: bool,
    },

    SignatureHelpShown {
        server: ServerId,
        signature_count: usize,
    },
}

/// Unique identifier for completion request cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionRequestId(pub u64);

impl CompletionRequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

/// Reason a request cycle was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// Superseded by a newer cycle
    NewRequest,
    /// Insertion mode ended
    InsertLeave,
    /// A candidate was accepted
    Accepted,
    /// The popup closed without a selection
    Dismissed,
    /// The server was detached from the buffer
    Detached,
}

impl Event {
    pub fn request_id(&self) -> Option<CompletionRequestId> {
        match self {
            Event::Requested { request_id, .. }
            | Event::Cancelled { request_id, .. }
            | Event::ResultsShown { request_id, .. }
            | Event::RequestFailed { request_id, .. } => Some(*request_id),
            Event::ItemAccepted { .. } | Event::SignatureHelpShown { .. } => None,
        }
    }
}
