// ABOUTME: Per-buffer completion engine: decides when requests are sent and renders results
// ABOUTME: Owns debounce timers, request cancellation, bindings and the merge step

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use quill_events::completion::{CancellationReason, CompletionRequestId, Event};
use quill_events::{CompletionEventBus, EventBus};
use quill_logging::{debug, info, instrument, trace};
use quill_types::lsp;
use quill_types::{
    AttachOptions, CompletionConfig, CompletionTrigger, OffsetEncoding, ResponseError, ServerId,
};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::accept::PendingResolve;
use crate::binding::ClientBinding;
use crate::boundary::naive_start;
use crate::cancel::{PendingRequest, guarded_callback};
use crate::commands::{CommandHandler, CommandRegistry, FollowUp};
use crate::context::{RequestContext, RequestCycle};
use crate::error::{CompletionError, Result};
use crate::fuzzy::{FuzzyMatcher, NucleoMatcher};
use crate::host::{
    BufferMode, Notifier, NotifyLevel, Popup, SignatureHelpView, SnippetEngine, TextBuffer,
    Transport,
};
use crate::latency::LatencyEstimator;
use crate::merge::{MergeRequest, merge_responses};
use crate::message::{EngineMessage, Message};
use crate::position::to_lsp_position;
use crate::report::ErrorReporter;
use crate::signature_help::SignatureHelpState;
use crate::snippet::SnippetProviders;
use crate::timer::{DebounceTimer, TimerKind};

pub const COMPLETION_METHOD: &str = "textDocument/completion";

/// Observable phase of the completion request cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    Idle,
    LeadingDebounce,
    RequestInFlight,
    SubsequentDebounce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Leading,
    Subsequent,
}

/// The armed completion timer and the trigger it will fire with
#[derive(Debug)]
struct ScheduledCompletion {
    _timer: DebounceTimer,
    trigger: CompletionTrigger,
    phase: Phase,
}

/// Collects the host collaborators. `build` fails when a required one is missing.
pub struct CompletionEngineBuilder {
    config: CompletionConfig,
    buffer: Option<Box<dyn TextBuffer>>,
    popup: Option<Box<dyn Popup>>,
    transport: Option<Arc<dyn Transport>>,
    notifier: Option<Box<dyn Notifier>>,
    signature_view: Option<Box<dyn SignatureHelpView>>,
    snippets: SnippetProviders,
    commands: Option<CommandRegistry>,
    matcher: Option<Box<dyn FuzzyMatcher>>,
    runtime: Option<Handle>,
}

impl CompletionEngineBuilder {
    pub fn buffer(mut self, buffer: impl TextBuffer + 'static) -> Self {
        self.buffer = Some(Box::new(buffer));
        self
    }

    pub fn popup(mut self, popup: impl Popup + 'static) -> Self {
        self.popup = Some(Box::new(popup));
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Some(Box::new(notifier));
        self
    }

    pub fn signature_help_view(mut self, view: impl SignatureHelpView + 'static) -> Self {
        self.signature_view = Some(Box::new(view));
        self
    }

    /// Register a snippet engine. Engines are tried in registration order.
    pub fn snippet_engine(mut self, engine: impl SnippetEngine + 'static) -> Self {
        self.snippets.push(Box::new(engine));
        self
    }

    /// Global command handlers; defaults to `CommandRegistry::with_defaults`
    pub fn commands(mut self, registry: CommandRegistry) -> Self {
        self.commands = Some(registry);
        self
    }

    pub fn fuzzy_matcher(mut self, matcher: impl FuzzyMatcher + 'static) -> Self {
        self.matcher = Some(Box::new(matcher));
        self
    }

    /// Runtime the debounce timers run on; defaults to the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<CompletionEngine> {
        self.config
            .validate()
            .map_err(|err| CompletionError::InvalidConfig {
                message: format!("{err:#}"),
            })?;

        let buffer = self.buffer.ok_or(CompletionError::MissingCollaborator {
            collaborator: "text buffer",
        })?;
        let popup = self.popup.ok_or(CompletionError::MissingCollaborator {
            collaborator: "popup",
        })?;
        let transport = self.transport.ok_or(CompletionError::MissingCollaborator {
            collaborator: "transport",
        })?;
        let notifier = self.notifier.ok_or(CompletionError::MissingCollaborator {
            collaborator: "notifier",
        })?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| CompletionError::MissingCollaborator {
                collaborator: "tokio runtime",
            })?,
        };

        let (tx, rx) = mpsc::unbounded_channel();

        info!(
            leading_debounce_ms = self.config.leading_debounce_ms,
            server_side_fuzzy = self.config.server_side_fuzzy_completion,
            trigger_on_delete = self.config.trigger_on_delete,
            "Completion engine initialized"
        );

        Ok(CompletionEngine {
            config: self.config,
            buffer,
            popup,
            transport,
            notifier,
            signature_view: self.signature_view,
            snippets: self.snippets,
            commands: self.commands.unwrap_or_else(CommandRegistry::with_defaults),
            matcher: self
                .matcher
                .unwrap_or_else(|| Box::new(NucleoMatcher::new())),
            runtime,
            bindings: BTreeMap::new(),
            context: RequestContext::default(),
            latency: LatencyEstimator::new(),
            completion_timer: None,
            signature: SignatureHelpState::default(),
            resolve: None,
            reporter: ErrorReporter::default(),
            events: CompletionEventBus::new(),
            next_request_id: CompletionRequestId::new(0),
            tx,
            rx,
        })
    }
}

/// Completion front-end for one buffer.
///
/// All methods run on the host's event loop. Responses and timer expiries arrive as
/// [`EngineMessage`]s which the host feeds back through [`CompletionEngine::handle_message`].
pub struct CompletionEngine {
    pub(crate) config: CompletionConfig,
    pub(crate) buffer: Box<dyn TextBuffer>,
    pub(crate) popup: Box<dyn Popup>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) notifier: Box<dyn Notifier>,
    pub(crate) signature_view: Option<Box<dyn SignatureHelpView>>,
    pub(crate) snippets: SnippetProviders,
    pub(crate) commands: CommandRegistry,
    matcher: Box<dyn FuzzyMatcher>,
    pub(crate) runtime: Handle,
    pub(crate) bindings: BTreeMap<ServerId, ClientBinding>,
    pub(crate) context: RequestContext,
    latency: LatencyEstimator,
    completion_timer: Option<ScheduledCompletion>,
    pub(crate) signature: SignatureHelpState,
    pub(crate) resolve: Option<PendingResolve>,
    pub(crate) reporter: ErrorReporter,
    pub(crate) events: CompletionEventBus,
    next_request_id: CompletionRequestId,
    pub(crate) tx: UnboundedSender<EngineMessage>,
    rx: UnboundedReceiver<EngineMessage>,
}

impl CompletionEngine {
    pub fn builder(config: CompletionConfig) -> CompletionEngineBuilder {
        CompletionEngineBuilder {
            config,
            buffer: None,
            popup: None,
            transport: None,
            notifier: None,
            signature_view: None,
            snippets: SnippetProviders::default(),
            commands: None,
            matcher: None,
            runtime: None,
        }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn state(&self) -> OrchestratorState {
        match (&self.completion_timer, &self.context.cycle) {
            (Some(scheduled), _) if scheduled.phase == Phase::Subsequent => {
                OrchestratorState::SubsequentDebounce
            }
            (Some(_), _) => OrchestratorState::LeadingDebounce,
            (None, Some(_)) => OrchestratorState::RequestInFlight,
            (None, None) => OrchestratorState::Idle,
        }
    }

    /// Lifecycle events published from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<Event> {
        self.events.subscribe()
    }

    pub fn latency_estimate(&self) -> Option<Duration> {
        self.latency.estimate()
    }

    pub fn binding(&self, server: ServerId) -> Option<&ClientBinding> {
        self.bindings.get(&server)
    }

    /// Bind a server to this buffer, replacing an earlier binding of the same server
    #[instrument(skip(self, capabilities, options))]
    pub fn attach(
        &mut self,
        server: ServerId,
        capabilities: &lsp::ServerCapabilities,
        options: AttachOptions,
    ) {
        let binding = ClientBinding::new(server, capabilities, &options, &self.config);
        info!(
            encoding = binding.encoding.as_str(),
            triggers = ?binding.trigger_characters,
            fuzzy = binding.fuzzy,
            "Attached language server"
        );
        if let Some(previous) = self.bindings.insert(server, binding) {
            debug!(commands = previous.local_commands.len(), "Replaced existing binding");
        }
    }

    /// Unbind a server, cancelling its outstanding requests
    #[instrument(skip(self))]
    pub fn detach(&mut self, server: ServerId) {
        if self.bindings.remove(&server).is_none() {
            return;
        }
        if self.signature.cancel_server(server) {
            self.finish_signature_help();
        }

        let Some(cycle) = self.context.cycle.as_mut() else {
            return;
        };
        let answered = cycle.responses.remove(&server).is_some();
        match cycle.pending.remove(&server) {
            Some(mut request) => request.cancel(),
            None if !answered => return,
            None => {}
        }
        if !cycle.pending.is_empty() {
            return;
        }
        if cycle.responses.is_empty() {
            let id = cycle.id;
            self.context.cycle = None;
            self.emit(Event::Cancelled {
                request_id: id,
                reason: CancellationReason::Detached,
            });
        } else {
            self.finish_cycle();
        }
    }

    /// Handler for a command of one server's items, consulted before the global registry
    pub fn register_client_command(
        &mut self,
        server: ServerId,
        command: impl Into<String>,
        handler: CommandHandler,
    ) -> Result<()> {
        let binding = self
            .bindings
            .get_mut(&server)
            .ok_or(CompletionError::UnknownServer { server })?;
        binding.local_commands.insert(command.into(), handler);
        Ok(())
    }

    /// A character was inserted; the buffer already contains it
    #[instrument(skip(self))]
    pub fn on_char_inserted(&mut self, ch: char) {
        if self.bindings.is_empty() {
            return;
        }

        if self.config.signature_help {
            self.schedule_signature_help(ch);
        }

        if self.popup.is_visible() {
            let fuzzy = self.bindings.values().any(|binding| binding.fuzzy);
            if self.context.is_incomplete || fuzzy {
                let trigger = if self.context.is_incomplete {
                    CompletionTrigger::Incomplete
                } else {
                    CompletionTrigger::Refresh
                };
                self.schedule_subsequent(trigger);
            }
            return;
        }

        let Some(delay) = self
            .bindings
            .values()
            .filter(|binding| binding.is_trigger_character(ch))
            .map(|binding| binding.leading_debounce)
            .max()
        else {
            return;
        };

        // Single shot: further typing does not push the deadline back
        if self.completion_timer.is_some() {
            trace!("Leading debounce already armed");
            return;
        }
        self.arm_completion_timer(delay, CompletionTrigger::Character(ch), Phase::Leading);
    }

    /// Text was deleted left of the cursor
    pub fn on_text_deleted(&mut self) {
        if !self.config.trigger_on_delete || self.bindings.is_empty() {
            return;
        }

        let cursor = self.buffer.cursor();
        match self.context.cursor {
            Some(tracked) if tracked.line == cursor.line && cursor.column >= tracked.column => {
                self.completion_timer = None;
                self.arm_completion_timer(
                    self.config.delete_retrigger(),
                    CompletionTrigger::Deletion,
                    Phase::Leading,
                );
            }
            _ => self.context.cursor = None,
        }
    }

    pub fn on_cursor_moved(&mut self) {
        let cursor = self.buffer.cursor();
        if self
            .context
            .cursor
            .is_some_and(|tracked| tracked.line != cursor.line)
        {
            self.context.cursor = None;
        }
    }

    /// Insertion mode ended: cancel everything in flight and stop all timers
    #[instrument(skip(self))]
    pub fn on_insert_leave(&mut self) {
        self.hard_reset(CancellationReason::InsertLeave);
    }

    /// Explicit completion request: skips the debounce
    #[instrument(skip(self))]
    pub fn trigger_completion(&mut self) {
        self.completion_timer = None;
        self.start_cycle(CompletionTrigger::Manual);
    }

    /// Accept the selected popup entry and expand it as a snippet.
    /// Returns false, changing nothing, when no popup is visible.
    pub fn accept_pending(&mut self) -> bool {
        if !self.popup.is_visible() {
            return false;
        }
        self.context.expand_snippet = true;
        self.popup.confirm();
        true
    }

    /// Wait for the next deferred message
    pub async fn next_message(&mut self) -> Option<EngineMessage> {
        self.rx.recv().await
    }

    /// Process every message that is ready. Returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    pub fn handle_message(&mut self, message: EngineMessage) {
        match message.inner {
            Message::TimerElapsed { token, .. } if token.is_cancelled() => {
                trace!("Dropping expired timer");
            }
            Message::TimerElapsed {
                kind: TimerKind::Completion,
                ..
            } => {
                if let Some(scheduled) = self.completion_timer.take() {
                    self.start_cycle(scheduled.trigger);
                }
            }
            Message::TimerElapsed {
                kind: TimerKind::SignatureHelp,
                ..
            } => self.on_signature_timer(),
            Message::CompletionResponse {
                request_id,
                server,
                token,
                result,
            } => self.on_completion_response(request_id, server, token, result),
            Message::SignatureHelpResponse {
                server,
                token,
                result,
            } => self.on_signature_response(server, token, result),
            Message::ResolveResponse { token, result } => self.on_resolve_response(token, result),
            Message::ExecuteCommandResponse {
                server,
                command,
                result,
            } => {
                if let Err(error) = result {
                    self.warn(format!(
                        "Command {command} failed on {server}: {}",
                        error.message
                    ));
                }
            }
        }
    }

    pub(crate) fn run_follow_up(&mut self, follow_up: FollowUp) {
        debug!(?follow_up, "Running command follow-up");
        match follow_up {
            FollowUp::TriggerCompletion => self.trigger_completion(),
            FollowUp::TriggerSignatureHelp => self.trigger_signature_help(),
        }
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.dispatch_completion(event);
    }

    pub(crate) fn warn(&mut self, message: String) {
        self.reporter
            .report(self.notifier.as_mut(), NotifyLevel::Warning, message);
    }

    pub(crate) fn report_error(&mut self, message: String) {
        self.reporter
            .report(self.notifier.as_mut(), NotifyLevel::Error, message);
    }

    /// Cancel requests and timers and clear the request state
    pub(crate) fn hard_reset(&mut self, reason: CancellationReason) {
        self.completion_timer = None;
        self.signature.cancel();
        if let Some(request_id) = self.context.reset() {
            self.emit(Event::Cancelled { request_id, reason });
        }
    }

    fn arm_completion_timer(&mut self, delay: Duration, trigger: CompletionTrigger, phase: Phase) {
        trace!(?trigger, ?phase, delay_ms = delay.as_millis() as u64, "Arming completion timer");
        let timer = DebounceTimer::spawn(&self.runtime, TimerKind::Completion, delay, self.tx.clone());
        self.completion_timer = Some(ScheduledCompletion {
            _timer: timer,
            trigger,
            phase,
        });
    }

    /// Window between requests while the popup is open
    fn subsequent_window(&self) -> Duration {
        self.bindings
            .values()
            .filter_map(|binding| binding.subsequent_debounce)
            .max()
            .or_else(|| self.latency.estimate())
            .unwrap_or_else(|| {
                self.bindings
                    .values()
                    .map(|binding| binding.leading_debounce)
                    .max()
                    .unwrap_or_else(|| self.config.leading_debounce())
            })
    }

    fn schedule_subsequent(&mut self, trigger: CompletionTrigger) {
        let window = self.subsequent_window();
        let since_last = self
            .context
            .last_request
            .map_or(window, |last| last.elapsed());
        let wait = window.saturating_sub(since_last);

        self.completion_timer = None;
        if wait.is_zero() {
            self.start_cycle(trigger);
        } else {
            self.arm_completion_timer(wait, trigger, Phase::Subsequent);
        }
    }

    /// Cancel the active cycle, then send a fresh request to every completion provider
    fn start_cycle(&mut self, trigger: CompletionTrigger) {
        if let Some(mut previous) = self.context.cycle.take() {
            previous.cancel();
            self.emit(Event::Cancelled {
                request_id: previous.id,
                reason: CancellationReason::NewRequest,
            });
        }

        let cursor = self.buffer.cursor();

        self.next_request_id = self.next_request_id.next();
        let mut cycle = RequestCycle::new(self.next_request_id, trigger, cursor);

        for binding in self.bindings.values().filter(|b| b.completion_provider) {
            let registered = trigger
                .character()
                .is_some_and(|ch| binding.is_trigger_character(ch));
            let params = lsp::CompletionParams {
                text_document_position: self.document_position(binding.encoding),
                work_done_progress_params: Default::default(),
                partial_result_params: Default::default(),
                context: Some(lsp::CompletionContext {
                    trigger_kind: trigger.lsp_kind(registered),
                    trigger_character: trigger
                        .character()
                        .filter(|_| registered)
                        .map(String::from),
                }),
            };
            let params = match serde_json::to_value(params) {
                Ok(params) => params,
                Err(err) => {
                    let error = CompletionError::EncodeParams {
                        method: COMPLETION_METHOD,
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
            let request_id = cycle.id;
            let token = cycle.token.child_token();
            let callback = guarded_callback(token.clone(), self.tx.clone(), move |token, result| {
                Message::CompletionResponse {
                    request_id,
                    server,
                    token,
                    result,
                }
            });
            let handle = self
                .transport
                .send_request(server, COMPLETION_METHOD, params, callback);
            cycle.pending.insert(server, PendingRequest { token, handle });
        }

        if cycle.pending.is_empty() {
            debug!("No server accepted the completion request");
            return;
        }

        if self.config.trigger_on_delete && self.context.cursor.is_none() {
            self.context.cursor = Some(cursor);
        }
        self.context.last_request = Some(Instant::now());

        let servers = cycle.pending.keys().copied().collect();
        info!(
            request_id = cycle.id.as_u64(),
            ?trigger,
            line = cursor.line,
            column = cursor.column,
            "Sending completion request"
        );
        let event = Event::Requested {
            request_id: cycle.id,
            trigger,
            cursor,
            servers,
        };
        self.context.cycle = Some(cycle);
        self.emit(event);
    }

    fn on_completion_response(
        &mut self,
        request_id: CompletionRequestId,
        server: ServerId,
        token: CancellationToken,
        result: std::result::Result<Value, ResponseError>,
    ) {
        if token.is_cancelled() {
            trace!(%server, "Dropping response of a cancelled request");
            return;
        }
        let Some(cycle) = self.context.cycle.as_mut() else {
            return;
        };
        if cycle.id != request_id {
            return;
        }
        if cycle.record(server, result) {
            self.finish_cycle();
        }
    }

    /// All servers reported: merge and render
    fn finish_cycle(&mut self) {
        let Some(cycle) = self.context.cycle.take() else {
            return;
        };
        if self.buffer.mode() != BufferMode::Insert {
            debug!(request_id = cycle.id.as_u64(), "Left insert mode, dropping results");
            return;
        }
        let cursor = self.buffer.cursor();
        if cursor.line != cycle.cursor.line {
            debug!(request_id = cycle.id.as_u64(), "Cursor changed lines, dropping results");
            return;
        }

        let line = self.buffer.current_line();
        let merged = merge_responses(
            MergeRequest {
                line_number: cursor.line,
                line: &line,
                cursor_column: cursor.column,
                naive_start: naive_start(&line, cursor.column),
            },
            cycle.responses,
            &self.bindings,
            self.matcher.as_mut(),
        );
        let rtt = cycle.started.elapsed();
        self.latency.record(rtt);

        for (server, error) in merged.errors {
            if !error.is_cancelled() {
                self.report_error(format!("Completion failed on {server}: {}", error.message));
            }
            self.emit(Event::RequestFailed {
                request_id: cycle.id,
                server,
                error,
            });
        }

        self.context.is_incomplete = merged.is_incomplete;
        let visible = self.popup.is_visible();
        if merged.matches.is_empty() && !visible {
            debug!(request_id = cycle.id.as_u64(), "No completion results");
            return;
        }
        if visible {
            self.context.suppress_complete_done = true;
        }

        let item_count = merged.matches.len();
        info!(
            request_id = cycle.id.as_u64(),
            trigger = ?cycle.trigger,
            items = item_count,
            start_column = merged.start_column,
            latency_ms = rtt.as_millis() as u64,
            "Showing completion results"
        );
        self.popup.show(merged.start_column, merged.matches);
        self.emit(Event::ResultsShown {
            request_id: cycle.id,
            start_column: merged.start_column,
            item_count,
            is_incomplete: merged.is_incomplete,
            latency_ms: u64::try_from(rtt.as_millis()).unwrap_or(u64::MAX),
        });
    }

    /// Document position of the cursor in a server's offset encoding
    pub(crate) fn document_position(
        &self,
        encoding: OffsetEncoding,
    ) -> lsp::TextDocumentPositionParams {
        let line = self.buffer.current_line();
        lsp::TextDocumentPositionParams::new(
            lsp::TextDocumentIdentifier::new(self.buffer.uri()),
            to_lsp_position(&line, self.buffer.cursor(), encoding),
        )
    }
}
