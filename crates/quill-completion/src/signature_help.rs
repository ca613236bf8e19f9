// ABOUTME: Signature help cycle driven by the servers' signature trigger characters
// ABOUTME: Debounced like completion; the first non-empty answer in server order is shown

use std::collections::BTreeMap;

use quill_events::completion::Event;
use quill_logging::{debug, trace};
use quill_types::lsp;
use quill_types::{ResponseError, ServerId};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cancel::{PendingRequest, guarded_callback};
use crate::engine::CompletionEngine;
use crate::error::CompletionError;
use crate::host::{BufferMode, NotifyLevel};
use crate::message::Message;
use crate::timer::{DebounceTimer, TimerKind};

pub const SIGNATURE_HELP_METHOD: &str = "textDocument/signatureHelp";

#[derive(Debug)]
struct ScheduledSignatureHelp {
    _timer: DebounceTimer,
    trigger: char,
}

#[derive(Debug)]
struct SignatureCycle {
    token: CancellationToken,
    pending: BTreeMap<ServerId, PendingRequest>,
    responses: BTreeMap<ServerId, Result<Value, ResponseError>>,
}

#[derive(Debug, Default)]
pub(crate) struct SignatureHelpState {
    timer: Option<ScheduledSignatureHelp>,
    cycle: Option<SignatureCycle>,
}

impl SignatureHelpState {
    /// Drop the timer and cancel outstanding requests
    pub(crate) fn cancel(&mut self) {
        self.timer = None;
        self.cancel_cycle();
    }

    fn cancel_cycle(&mut self) {
        if let Some(mut cycle) = self.cycle.take() {
            cycle.token.cancel();
            for request in cycle.pending.values_mut() {
                request.cancel();
            }
        }
    }

    /// Cancel the request to one server. Returns true when that leaves a cycle
    /// whose remaining servers have all answered.
    pub(crate) fn cancel_server(&mut self, server: ServerId) -> bool {
        let Some(cycle) = self.cycle.as_mut() else {
            return false;
        };
        match cycle.pending.remove(&server) {
            Some(mut request) => {
                request.cancel();
                cycle.pending.is_empty()
            }
            None => false,
        }
    }
}

impl CompletionEngine {
    /// Request signature help right away from every signature provider
    pub fn trigger_signature_help(&mut self) {
        if self.signature_view.is_none() {
            return;
        }
        self.signature.timer = None;
        self.send_signature_help(None);
    }

    pub(crate) fn schedule_signature_help(&mut self, ch: char) {
        if self.signature_view.is_none() {
            return;
        }
        let Some(delay) = self
            .bindings
            .values()
            .filter(|binding| binding.is_signature_trigger_character(ch))
            .map(|binding| binding.leading_debounce)
            .max()
        else {
            return;
        };

        trace!(trigger = %ch, delay_ms = delay.as_millis() as u64, "Scheduling signature help");
        let timer = DebounceTimer::spawn(
            &self.runtime,
            TimerKind::SignatureHelp,
            delay,
            self.tx.clone(),
        );
        self.signature.timer = Some(ScheduledSignatureHelp {
            _timer: timer,
            trigger: ch,
        });
    }

    pub(crate) fn on_signature_timer(&mut self) {
        if let Some(scheduled) = self.signature.timer.take() {
            self.send_signature_help(Some(scheduled.trigger));
        }
    }

    fn send_signature_help(&mut self, trigger: Option<char>) {
        self.signature.cancel_cycle();

        let mut cycle = SignatureCycle {
            token: CancellationToken::new(),
            pending: BTreeMap::new(),
            responses: BTreeMap::new(),
        };
        let context = lsp::SignatureHelpContext {
            trigger_kind: if trigger.is_some() {
                lsp::SignatureHelpTriggerKind::TRIGGER_CHARACTER
            } else {
                lsp::SignatureHelpTriggerKind::INVOKED
            },
            trigger_character: trigger.map(String::from),
            is_retrigger: false,
            active_signature_help: None,
        };

        for binding in self.bindings.values() {
            let wanted = match trigger {
                Some(ch) => binding.is_signature_trigger_character(ch),
                None => binding.signature_help_provider,
            };
            if !wanted {
                continue;
            }

            let params = lsp::SignatureHelpParams {
                context: Some(context.clone()),
                text_document_position_params: self.document_position(binding.encoding),
                work_done_progress_params: Default::default(),
            };
            let params = match serde_json::to_value(params) {
                Ok(params) => params,
                Err(err) => {
                    let error = CompletionError::EncodeParams {
                        method: SIGNATURE_HELP_METHOD,
                        message: err.to_string(),
                    };
                    self.reporter.report(
                        self.notifier.as_mut(),
                        NotifyLevel::Error,
                        error.to_string(),
                    );
                    continue;
                }
            };

            let server = binding.server;
            let token = cycle.token.child_token();
            let callback = guarded_callback(token.clone(), self.tx.clone(), move |token, result| {
                Message::SignatureHelpResponse {
                    server,
                    token,
                    result,
                }
            });
            let handle = self
                .transport
                .send_request(server, SIGNATURE_HELP_METHOD, params, callback);
            cycle.pending.insert(server, PendingRequest { token, handle });
        }

        if cycle.pending.is_empty() {
            return;
        }
        debug!(servers = cycle.pending.len(), ?trigger, "Requesting signature help");
        self.signature.cycle = Some(cycle);
    }

    pub(crate) fn on_signature_response(
        &mut self,
        server: ServerId,
        token: CancellationToken,
        result: Result<Value, ResponseError>,
    ) {
        if token.is_cancelled() {
            return;
        }
        let Some(cycle) = self.signature.cycle.as_mut() else {
            return;
        };
        if cycle.pending.remove(&server).is_none() {
            return;
        }
        cycle.responses.insert(server, result);
        if cycle.pending.is_empty() {
            self.finish_signature_help();
        }
    }

    pub(crate) fn finish_signature_help(&mut self) {
        let Some(cycle) = self.signature.cycle.take() else {
            return;
        };
        if self.buffer.mode() != BufferMode::Insert {
            return;
        }

        let mut shown = false;
        for (server, result) in cycle.responses {
            let value = match result {
                Ok(value) => value,
                Err(error) => {
                    if !error.is_cancelled() {
                        self.report_error(format!(
                            "Signature help failed on {server}: {}",
                            error.message
                        ));
                    }
                    continue;
                }
            };
            if shown {
                continue;
            }

            let help = match serde_json::from_value::<Option<lsp::SignatureHelp>>(value) {
                Ok(Some(help)) if !help.signatures.is_empty() => help,
                Ok(_) => continue,
                Err(err) => {
                    debug!(%server, error = %err, "Malformed signature help response");
                    continue;
                }
            };
            if let Some(view) = self.signature_view.as_mut() {
                view.show_signature_help(server, &help);
                shown = true;
                self.emit(Event::SignatureHelpShown {
                    server,
                    signature_count: help.signatures.len(),
                });
            }
        }
    }
}
