// ABOUTME: Completion acceptance: snippet expansion, additional text edits and item commands
// ABOUTME: Resolves lazily computed edits before applying them when the server supports it

use std::sync::Arc;

use quill_events::completion::{CancellationReason, Event};
use quill_logging::{debug, info, instrument, trace};
use quill_types::lsp;
use quill_types::{CompletionPayload, Cursor, NormalizedMatch, OffsetEncoding, ResponseError, ServerId};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cancel::guarded_callback;
use crate::engine::CompletionEngine;
use crate::error::CompletionError;
use crate::host::{BufferMode, RequestHandle};
use crate::message::Message;
use crate::position::{floor_char_boundary, from_lsp_position};
use crate::snippet::escape_snippet_text;

pub const RESOLVE_METHOD: &str = "completionItem/resolve";
pub const EXECUTE_COMMAND_METHOD: &str = "workspace/executeCommand";

/// A snippet whose literal insertion was removed from the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
struct Expansion {
    template: String,
    /// The removed literal word, re-inserted when expansion is impossible
    word: String,
    /// Text that followed the cursor on the line
    suffix: String,
}

/// Outstanding `completionItem/resolve` of the last accepted item
#[derive(Debug)]
pub(crate) struct PendingResolve {
    token: CancellationToken,
    handle: RequestHandle,
    payload: Arc<CompletionPayload>,
    expansion: Option<Expansion>,
    /// Buffer version the resolved edits may be applied to
    changedtick: u64,
}

impl PendingResolve {
    fn cancel(&mut self) {
        self.token.cancel();
        self.handle.cancel();
    }
}

impl CompletionEngine {
    /// The popup closed. `selected` is the accepted entry, or `None` when the
    /// popup was dismissed without a selection.
    #[instrument(skip_all, fields(accepted = selected.is_some()))]
    pub fn on_complete_done(&mut self, selected: Option<NormalizedMatch>) {
        if std::mem::take(&mut self.context.suppress_complete_done) {
            trace!("Popup replaced by fresh results");
            return;
        }
        let Some(selected) = selected else {
            self.hard_reset(CancellationReason::Dismissed);
            return;
        };

        let expand = self.context.expand_snippet;
        self.hard_reset(CancellationReason::Accepted);
        if let Some(mut previous) = self.resolve.take() {
            debug!("Superseding pending resolve");
            previous.cancel();
        }

        let payload = selected.payload.clone();
        let template = payload
            .replacement_text()
            .filter(|_| expand && payload.is_snippet())
            .map(str::to_string);
        let expansion = match template {
            Some(_) if !self.snippets.has_available() => {
                self.warn(format!(
                    "No snippet engine available to expand {}",
                    payload.item.label
                ));
                None
            }
            Some(template) => Some(self.remove_inserted_word(&selected.word, template)),
            None => None,
        };

        if let Some(edits) = payload
            .item
            .additional_text_edits
            .as_deref()
            .filter(|edits| !edits.is_empty())
        {
            self.apply_text_edits(payload.server, edits);
            self.finish_accept(&payload, None, expansion);
            return;
        }

        let resolvable = self
            .bindings
            .get(&payload.server)
            .is_some_and(|binding| binding.resolve_provider);
        if resolvable {
            self.send_resolve(payload, expansion);
        } else {
            self.finish_accept(&payload, None, expansion);
        }
    }

    /// Delete the inserted word and the rest of the line, keeping both for later
    fn remove_inserted_word(&mut self, word: &str, template: String) -> Expansion {
        let cursor = self.buffer.cursor();
        let line = self.buffer.current_line();
        let end = floor_char_boundary(&line, cursor.column);
        let start = floor_char_boundary(&line, end.saturating_sub(word.len()));

        let expansion = Expansion {
            template,
            word: line[start..end].to_string(),
            suffix: line[end..].to_string(),
        };
        self.buffer.set_text_range(
            Cursor::new(cursor.line, start),
            Cursor::new(cursor.line, line.len()),
            "",
        );
        expansion
    }

    fn send_resolve(&mut self, payload: Arc<CompletionPayload>, expansion: Option<Expansion>) {
        let params = match serde_json::to_value(&payload.item) {
            Ok(params) => params,
            Err(err) => {
                let error = CompletionError::EncodeParams {
                    method: RESOLVE_METHOD,
                    message: err.to_string(),
                };
                self.report_error(error.to_string());
                self.finish_accept(&payload, None, expansion);
                return;
            }
        };

        let token = CancellationToken::new();
        let callback = guarded_callback(token.clone(), self.tx.clone(), |token, result| {
            Message::ResolveResponse { token, result }
        });
        let handle = self
            .transport
            .send_request(payload.server, RESOLVE_METHOD, params, callback);
        debug!(server = %payload.server, label = %payload.item.label, "Resolving accepted item");

        self.resolve = Some(PendingResolve {
            token,
            handle,
            payload,
            expansion,
            changedtick: self.buffer.changedtick(),
        });
    }

    pub(crate) fn on_resolve_response(
        &mut self,
        token: CancellationToken,
        result: Result<Value, ResponseError>,
    ) {
        if token.is_cancelled() {
            return;
        }
        let Some(pending) = self.resolve.take() else {
            return;
        };
        let server = pending.payload.server;

        let mut command = None;
        match result {
            Ok(value) => match serde_json::from_value::<lsp::CompletionItem>(value) {
                Ok(resolved) => {
                    command = resolved.command;
                    let edits = resolved.additional_text_edits.unwrap_or_default();
                    if edits.is_empty() {
                        trace!("Resolved item carries no additional edits");
                    } else if self.buffer.changedtick() == pending.changedtick {
                        self.apply_text_edits(server, &edits);
                    } else {
                        debug!(%server, "Buffer changed while resolving, dropping edits");
                    }
                }
                Err(err) => {
                    self.warn(format!("Invalid resolve response from {server}: {err}"));
                }
            },
            Err(error) if error.is_cancelled() => {}
            Err(error) => {
                self.warn(format!(
                    "Failed to resolve completion item on {server}: {}",
                    error.message
                ));
            }
        }

        self.finish_accept(&pending.payload, command, pending.expansion);
    }

    /// Apply server edits last to first so earlier positions stay valid
    fn apply_text_edits(&mut self, server: ServerId, edits: &[lsp::TextEdit]) {
        let encoding = self
            .bindings
            .get(&server)
            .map_or(OffsetEncoding::default(), |binding| binding.encoding);

        let mut edits: Vec<&lsp::TextEdit> = edits.iter().collect();
        edits.sort_by_key(|edit| (edit.range.start.line, edit.range.start.character));

        for edit in edits.into_iter().rev() {
            let start_line = self.buffer.line(edit.range.start.line).unwrap_or_default();
            let end_line = if edit.range.end.line == edit.range.start.line {
                start_line.clone()
            } else {
                self.buffer.line(edit.range.end.line).unwrap_or_default()
            };
            let start = from_lsp_position(&start_line, edit.range.start, encoding);
            let end = from_lsp_position(&end_line, edit.range.end, encoding);
            self.buffer.set_text_range(start, end, &edit.new_text);
        }
    }

    /// Expand the snippet, run the item's command and publish the acceptance
    fn finish_accept(
        &mut self,
        payload: &CompletionPayload,
        resolved_command: Option<lsp::Command>,
        expansion: Option<Expansion>,
    ) {
        let expanded_snippet = match expansion {
            Some(expansion) => self.expand(expansion),
            None => false,
        };

        info!(
            server = %payload.server,
            label = %payload.item.label,
            expanded_snippet,
            "Accepted completion item"
        );
        self.emit(Event::ItemAccepted {
            server: payload.server,
            label: payload.item.label.clone(),
            expanded_snippet,
        });

        if let Some(command) = resolved_command.or_else(|| payload.item.command.clone()) {
            self.execute_command(payload.server, command);
        }
    }

    /// Hand the template to the first available engine. Falls back to the literal text.
    fn expand(&mut self, expansion: Expansion) -> bool {
        if self.buffer.mode() == BufferMode::Insert {
            let snippet = format!(
                "{}{}",
                expansion.template,
                escape_snippet_text(&expansion.suffix)
            );
            if let Some(engine) = self.snippets.expand(&snippet) {
                debug!(%engine, "Expanded snippet");
                return true;
            }
            self.warn("No snippet engine available, inserting literal text".to_string());
        }

        let cursor = self.buffer.cursor();
        self.buffer.set_text_range(
            cursor,
            cursor,
            &format!("{}{}", expansion.word, expansion.suffix),
        );
        false
    }

    /// Route an item command: client handler, then global handler, then the server
    fn execute_command(&mut self, server: ServerId, command: lsp::Command) {
        let handler = self
            .bindings
            .get(&server)
            .and_then(|binding| binding.local_commands.get(&command.command).cloned())
            .or_else(|| self.commands.get(&command.command));

        if let Some(handler) = handler {
            debug!(command = %command.command, "Running client command handler");
            if let Some(follow_up) = handler(&command, server) {
                self.run_follow_up(follow_up);
            }
            return;
        }

        let supported = self
            .bindings
            .get(&server)
            .is_some_and(|binding| binding.supports_command(&command.command));
        if !supported {
            self.warn(format!(
                "Unsupported command {} from {server}",
                command.command
            ));
            return;
        }

        let params = lsp::ExecuteCommandParams {
            command: command.command.clone(),
            arguments: command.arguments.unwrap_or_default(),
            work_done_progress_params: Default::default(),
        };
        let params = match serde_json::to_value(params) {
            Ok(params) => params,
            Err(err) => {
                let error = CompletionError::EncodeParams {
                    method: EXECUTE_COMMAND_METHOD,
                    message: err.to_string(),
                };
                self.report_error(error.to_string());
                return;
            }
        };

        let name = command.command;
        debug!(command = %name, %server, "Executing command on server");
        let callback = guarded_callback(
            CancellationToken::new(),
            self.tx.clone(),
            move |_, result| Message::ExecuteCommandResponse {
                server,
                command: name,
                result,
            },
        );
        // Fire and forget: the reply only matters when it is an error
        let _handle = self
            .transport
            .send_request(server, EXECUTE_COMMAND_METHOD, params, callback);
    }
}
