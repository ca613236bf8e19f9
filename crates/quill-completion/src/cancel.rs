// ABOUTME: Per-request cancellation shared by the engine and the transport
// ABOUTME: Late callbacks of cancelled requests are dropped before they reach the engine

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::host::{RequestHandle, ResponseCallback};
use crate::message::{EngineMessage, Message};
use quill_types::ResponseError;
use serde_json::Value;

/// An outstanding request to one server
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub(crate) token: CancellationToken,
    pub(crate) handle: RequestHandle,
}

impl PendingRequest {
    /// Cancel locally and at the transport. Idempotent.
    pub(crate) fn cancel(&mut self) {
        self.token.cancel();
        self.handle.cancel();
    }
}

/// Wrap a response into an engine message, unless `token` was cancelled first
pub(crate) fn guarded_callback(
    token: CancellationToken,
    tx: UnboundedSender<EngineMessage>,
    wrap: impl FnOnce(CancellationToken, Result<Value, ResponseError>) -> Message + Send + 'static,
) -> ResponseCallback {
    Box::new(move |result| {
        if token.is_cancelled() {
            return;
        }
        let _ = tx.send(EngineMessage::new(wrap(token, result)));
    })
}
