// ABOUTME: Per-buffer request state shared by the orchestrator and the acceptance handler
// ABOUTME: Tracks the active request cycle and the flags that outlive it

use std::collections::BTreeMap;

use quill_events::completion::CompletionRequestId;
use quill_types::{CompletionTrigger, Cursor, ResponseError, ServerId};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cancel::PendingRequest;

/// Requests of one completion trigger, one per server
#[derive(Debug)]
pub(crate) struct RequestCycle {
    pub(crate) id: CompletionRequestId,
    pub(crate) trigger: CompletionTrigger,
    pub(crate) cursor: Cursor,
    pub(crate) started: Instant,
    /// Parent of every per-server token
    pub(crate) token: CancellationToken,
    pub(crate) pending: BTreeMap<ServerId, PendingRequest>,
    pub(crate) responses: BTreeMap<ServerId, Result<Value, ResponseError>>,
}

impl RequestCycle {
    pub(crate) fn new(
        id: CompletionRequestId,
        trigger: CompletionTrigger,
        cursor: Cursor,
    ) -> Self {
        Self {
            id,
            trigger,
            cursor,
            started: Instant::now(),
            token: CancellationToken::new(),
            pending: BTreeMap::new(),
            responses: BTreeMap::new(),
        }
    }

    /// Store a response. Returns true once every server has reported.
    pub(crate) fn record(
        &mut self,
        server: ServerId,
        result: Result<Value, ResponseError>,
    ) -> bool {
        if self.pending.remove(&server).is_some() {
            self.responses.insert(server, result);
        }
        self.pending.is_empty()
    }

    /// Cancel every outstanding request. Idempotent.
    pub(crate) fn cancel(&mut self) {
        self.token.cancel();
        for request in self.pending.values_mut() {
            request.cancel();
        }
    }
}

/// Request state of one buffer
#[derive(Debug, Default)]
pub(crate) struct RequestContext {
    pub(crate) last_request: Option<Instant>,
    pub(crate) cycle: Option<RequestCycle>,
    /// The last merged result was incomplete
    pub(crate) is_incomplete: bool,
    /// Swallow the close event caused by replacing a visible popup
    pub(crate) suppress_complete_done: bool,
    /// The next acceptance came through the expanding entry point
    pub(crate) expand_snippet: bool,
    /// Position tracked for re-triggering on delete
    pub(crate) cursor: Option<Cursor>,
}

impl RequestContext {
    /// Cancel the active cycle and forget everything but the tracked cursor.
    /// Returns the id of the cycle that was cancelled, if any.
    pub(crate) fn reset(&mut self) -> Option<CompletionRequestId> {
        let cancelled = self.cycle.take().map(|mut cycle| {
            cycle.cancel();
            cycle.id
        });
        *self = Self {
            cursor: self.cursor,
            ..Self::default()
        };
        cancelled
    }
}
