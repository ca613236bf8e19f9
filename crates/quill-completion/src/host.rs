// ABOUTME: Interfaces of the host collaborators the engine drives
// ABOUTME: Text buffer, popup widget, transport, notifier, signature view and snippet engines

use quill_types::lsp;
use quill_types::{Cursor, NormalizedMatch, ResponseError, ServerId};
use serde_json::Value;

/// Editing mode of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    Insert,
    Other,
}

/// The buffer the engine completes in. Columns are byte offsets into the line.
pub trait TextBuffer: Send {
    fn uri(&self) -> lsp::Uri;

    fn current_line(&self) -> String;

    /// Text of an arbitrary line, without its line ending
    fn line(&self, line: u32) -> Option<String>;

    fn cursor(&self) -> Cursor;

    /// Replace the text between two positions. `end` may lie on a later line.
    fn set_text_range(&mut self, start: Cursor, end: Cursor, text: &str);

    fn mode(&self) -> BufferMode;

    /// Counter bumped on every buffer modification
    fn changedtick(&self) -> u64;
}

/// The completion popup widget
pub trait Popup: Send {
    fn show(&mut self, start_column: usize, matches: Vec<NormalizedMatch>);

    fn is_visible(&self) -> bool;

    /// Accept the selected entry. The host reports the result through
    /// `CompletionEngine::on_complete_done`.
    fn confirm(&mut self);
}

/// Optional view for signature help
pub trait SignatureHelpView: Send {
    fn show_signature_help(&mut self, server: ServerId, help: &lsp::SignatureHelp);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Warning,
    Error,
}

/// User-facing reports
pub trait Notifier: Send {
    fn notify(&mut self, level: NotifyLevel, message: &str);
}

pub type ResponseCallback = Box<dyn FnOnce(Result<Value, ResponseError>) + Send + 'static>;

/// Cancels an outstanding request at the transport. Cancelling twice is a no-op.
#[must_use]
pub struct RequestHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl RequestHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Handle for transports that cannot cancel
    pub fn detached() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandle")
            .field("pending", &self.cancel.is_some())
            .finish()
    }
}

/// JSON-RPC transport to the attached servers
pub trait Transport: Send + Sync {
    /// Send a request; `on_result` runs at most once, on any thread.
    fn send_request(
        &self,
        server: ServerId,
        method: &str,
        params: Value,
        on_result: ResponseCallback,
    ) -> RequestHandle;
}

/// A snippet expansion provider. Providers are queried in registration order
/// every time an expansion is needed.
pub trait SnippetEngine: Send {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Expand `template` at the cursor
    fn expand(&mut self, template: &str);
}
