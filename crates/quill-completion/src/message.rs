// ABOUTME: Messages posted back to the engine by timers and transport callbacks
// ABOUTME: The host drains them on its event loop and hands them to the engine

use quill_events::completion::CompletionRequestId;
use quill_types::{ResponseError, ServerId};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::timer::TimerKind;

/// Opaque unit of deferred work for `CompletionEngine::handle_message`
#[derive(Debug)]
pub struct EngineMessage {
    pub(crate) inner: Message,
}

impl EngineMessage {
    pub(crate) fn new(inner: Message) -> Self {
        Self { inner }
    }
}

#[derive(Debug)]
pub(crate) enum Message {
    TimerElapsed {
        kind: TimerKind,
        token: CancellationToken,
    },
    CompletionResponse {
        request_id: CompletionRequestId,
        server: ServerId,
        token: CancellationToken,
        result: Result<Value, ResponseError>,
    },
    SignatureHelpResponse {
        server: ServerId,
        token: CancellationToken,
        result: Result<Value, ResponseError>,
    },
    ResolveResponse {
        token: CancellationToken,
        result: Result<Value, ResponseError>,
    },
    ExecuteCommandResponse {
        server: ServerId,
        command: String,
        result: Result<Value, ResponseError>,
    },
}
