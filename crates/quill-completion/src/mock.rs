// ABOUTME: Controllable host collaborators for engine tests
// ABOUTME: In-memory buffer, popup, transport, notifier, snippet engine and signature view

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use quill_events::completion::Event;
use quill_types::lsp;
use quill_types::{CompletionConfig, Cursor, NormalizedMatch, ResponseError, ServerId};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::engine::CompletionEngine;
use crate::host::{
    BufferMode, Notifier, NotifyLevel, Popup, RequestHandle, ResponseCallback, SignatureHelpView,
    SnippetEngine, TextBuffer, Transport,
};
use quill_types::AttachOptions;

#[derive(Debug)]
struct BufferState {
    lines: Vec<String>,
    cursor: Cursor,
    mode: BufferMode,
    changedtick: u64,
}

/// Shared in-memory buffer; clones observe the same text
#[derive(Debug, Clone)]
pub(crate) struct MockBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl MockBuffer {
    pub(crate) fn new(lines: &[&str], cursor: Cursor) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                lines: lines.iter().map(|line| line.to_string()).collect(),
                cursor,
                mode: BufferMode::Insert,
                changedtick: 1,
            })),
        }
    }

    pub(crate) fn text(&self) -> String {
        self.state.lock().lines.join("\n")
    }

    pub(crate) fn set_cursor(&self, cursor: Cursor) {
        self.state.lock().cursor = cursor;
    }

    pub(crate) fn set_mode(&self, mode: BufferMode) {
        self.state.lock().mode = mode;
    }

    /// Insert at the cursor like typing would
    pub(crate) fn type_text(&self, text: &str) {
        let cursor = self.cursor();
        let mut buffer = self.clone();
        buffer.set_text_range(cursor, cursor, text);
    }

    /// Remove the character left of the cursor
    pub(crate) fn backspace(&self) {
        let cursor = self.cursor();
        let line = self.current_line();
        let Some((start, _)) = line[..cursor.column].char_indices().last() else {
            return;
        };
        let mut buffer = self.clone();
        buffer.set_text_range(Cursor::new(cursor.line, start), cursor, "");
    }
}

impl TextBuffer for MockBuffer {
    fn uri(&self) -> lsp::Uri {
        "file:///tmp/main.rs".parse().unwrap()
    }

    fn current_line(&self) -> String {
        let state = self.state.lock();
        state.lines[state.cursor.line as usize].clone()
    }

    fn line(&self, line: u32) -> Option<String> {
        self.state.lock().lines.get(line as usize).cloned()
    }

    fn cursor(&self) -> Cursor {
        self.state.lock().cursor
    }

    fn set_text_range(&mut self, start: Cursor, end: Cursor, text: &str) {
        let mut state = self.state.lock();
        let (first, last) = (start.line as usize, end.line as usize);
        let joined = format!(
            "{}{}{}",
            &state.lines[first][..start.column],
            text,
            &state.lines[last][end.column..]
        );
        let replacement: Vec<String> = joined.split('\n').map(str::to_string).collect();
        let added_lines = replacement.len() as u32;
        state.lines.splice(first..=last, replacement);
        state.changedtick += 1;

        let cursor = state.cursor;
        if start.line == end.line && added_lines == 1 && cursor.line == start.line {
            if cursor.column >= end.column {
                state.cursor.column = cursor.column - (end.column - start.column) + text.len();
            } else if cursor.column > start.column {
                state.cursor.column = start.column + text.len();
            }
        } else if end.line < cursor.line {
            state.cursor.line = cursor.line - (end.line - start.line) + added_lines - 1;
        }
    }

    fn mode(&self) -> BufferMode {
        self.state.lock().mode
    }

    fn changedtick(&self) -> u64 {
        self.state.lock().changedtick
    }
}

#[derive(Debug, Default)]
struct PopupState {
    visible: bool,
    shown: Vec<(usize, Vec<NormalizedMatch>)>,
    confirms: usize,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockPopup {
    state: Arc<Mutex<PopupState>>,
}

impl MockPopup {
    pub(crate) fn set_visible(&self, visible: bool) {
        self.state.lock().visible = visible;
    }

    pub(crate) fn show_count(&self) -> usize {
        self.state.lock().shown.len()
    }

    pub(crate) fn last_shown(&self) -> Option<(usize, Vec<NormalizedMatch>)> {
        self.state.lock().shown.last().cloned()
    }

    pub(crate) fn confirms(&self) -> usize {
        self.state.lock().confirms
    }
}

impl Popup for MockPopup {
    fn show(&mut self, start_column: usize, matches: Vec<NormalizedMatch>) {
        let mut state = self.state.lock();
        state.visible = true;
        state.shown.push((start_column, matches));
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn confirm(&mut self) {
        self.state.lock().confirms += 1;
    }
}

struct RecordedRequest {
    server: ServerId,
    method: String,
    params: Value,
    callback: Option<ResponseCallback>,
}

#[derive(Default)]
struct TransportState {
    requests: Vec<RecordedRequest>,
    auto_replies: HashMap<(ServerId, String), Result<Value, ResponseError>>,
    cancels: Vec<(ServerId, String)>,
}

/// Records requests. Replies are either configured up front or sent by the test.
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    /// Answer every future `method` request to `server` immediately
    pub(crate) fn auto_reply(
        &self,
        server: ServerId,
        method: &str,
        result: Result<Value, ResponseError>,
    ) {
        self.state
            .lock()
            .auto_replies
            .insert((server, method.to_string()), result);
    }

    pub(crate) fn requests(&self, method: &str) -> Vec<(ServerId, Value)> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|request| request.method == method)
            .map(|request| (request.server, request.params.clone()))
            .collect()
    }

    pub(crate) fn request_count(&self, method: &str) -> usize {
        self.requests(method).len()
    }

    /// Answer the oldest unanswered `method` request to `server`
    pub(crate) fn respond(
        &self,
        server: ServerId,
        method: &str,
        result: Result<Value, ResponseError>,
    ) -> bool {
        let callback = self
            .state
            .lock()
            .requests
            .iter_mut()
            .find(|request| {
                request.server == server && request.method == method && request.callback.is_some()
            })
            .and_then(|request| request.callback.take());
        match callback {
            Some(callback) => {
                callback(result);
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancels(&self, method: &str) -> usize {
        self.state
            .lock()
            .cancels
            .iter()
            .filter(|(_, cancelled)| cancelled == method)
            .count()
    }
}

impl Transport for MockTransport {
    fn send_request(
        &self,
        server: ServerId,
        method: &str,
        params: Value,
        on_result: ResponseCallback,
    ) -> RequestHandle {
        let auto = self
            .state
            .lock()
            .auto_replies
            .get(&(server, method.to_string()))
            .cloned();

        let callback = match auto {
            Some(result) => {
                on_result(result);
                None
            }
            None => Some(on_result),
        };
        self.state.lock().requests.push(RecordedRequest {
            server,
            method: method.to_string(),
            params,
            callback,
        });

        let state = self.state.clone();
        let method = method.to_string();
        RequestHandle::new(move || state.lock().cancels.push((server, method)))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockNotifier {
    messages: Arc<Mutex<Vec<(NotifyLevel, String)>>>,
}

impl MockNotifier {
    pub(crate) fn messages(&self) -> Vec<(NotifyLevel, String)> {
        self.messages.lock().clone()
    }
}

impl Notifier for MockNotifier {
    fn notify(&mut self, level: NotifyLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MockSnippetEngine {
    available: Arc<Mutex<bool>>,
    expanded: Arc<Mutex<Vec<String>>>,
}

impl MockSnippetEngine {
    pub(crate) fn new(available: bool) -> Self {
        Self {
            available: Arc::new(Mutex::new(available)),
            expanded: Arc::default(),
        }
    }

    pub(crate) fn set_available(&self, available: bool) {
        *self.available.lock() = available;
    }

    pub(crate) fn expanded(&self) -> Vec<String> {
        self.expanded.lock().clone()
    }
}

impl SnippetEngine for MockSnippetEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_available(&self) -> bool {
        *self.available.lock()
    }

    fn expand(&mut self, template: &str) {
        self.expanded.lock().push(template.to_string());
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockSignatureView {
    shown: Arc<Mutex<Vec<(ServerId, lsp::SignatureHelp)>>>,
}

impl MockSignatureView {
    pub(crate) fn shown(&self) -> Vec<(ServerId, lsp::SignatureHelp)> {
        self.shown.lock().clone()
    }
}

impl SignatureHelpView for MockSignatureView {
    fn show_signature_help(&mut self, server: ServerId, help: &lsp::SignatureHelp) {
        self.shown.lock().push((server, help.clone()));
    }
}

/// Server capabilities with completion, optional resolve and signature help
pub(crate) fn capabilities(triggers: &[&str], resolve: bool) -> lsp::ServerCapabilities {
    lsp::ServerCapabilities {
        completion_provider: Some(lsp::CompletionOptions {
            resolve_provider: Some(resolve),
            trigger_characters: Some(triggers.iter().map(|t| t.to_string()).collect()),
            ..Default::default()
        }),
        signature_help_provider: Some(lsp::SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string()]),
            retrigger_characters: Some(vec![",".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// An engine wired to mocks, with handles for inspecting them
pub(crate) struct Harness {
    pub(crate) engine: CompletionEngine,
    pub(crate) buffer: MockBuffer,
    pub(crate) popup: MockPopup,
    pub(crate) transport: MockTransport,
    pub(crate) notifier: MockNotifier,
    pub(crate) snippets: MockSnippetEngine,
    pub(crate) signatures: MockSignatureView,
    events: UnboundedReceiver<Event>,
}

impl Harness {
    /// Must run inside a tokio runtime
    pub(crate) fn new(config: CompletionConfig, lines: &[&str], cursor: Cursor) -> Self {
        let buffer = MockBuffer::new(lines, cursor);
        let popup = MockPopup::default();
        let transport = MockTransport::default();
        let notifier = MockNotifier::default();
        let snippets = MockSnippetEngine::new(true);
        let signatures = MockSignatureView::default();

        let mut engine = CompletionEngine::builder(config)
            .buffer(buffer.clone())
            .popup(popup.clone())
            .transport(Arc::new(transport.clone()))
            .notifier(notifier.clone())
            .snippet_engine(snippets.clone())
            .signature_help_view(signatures.clone())
            .build()
            .unwrap();
        let events = engine.subscribe();

        Self {
            engine,
            buffer,
            popup,
            transport,
            notifier,
            snippets,
            signatures,
            events,
        }
    }

    pub(crate) fn attach(&mut self, server: ServerId, capabilities: lsp::ServerCapabilities) {
        self.engine
            .attach(server, &capabilities, AttachOptions::default());
    }

    pub(crate) fn type_char(&mut self, ch: char) {
        self.buffer.type_text(&ch.to_string());
        self.engine.on_char_inserted(ch);
    }

    /// Let paused time run forward, then process whatever became ready
    pub(crate) async fn advance(&mut self, ms: u64) -> usize {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        self.engine.drain()
    }

    pub(crate) fn events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
