// ABOUTME: Completion data model shared by the engine and its hosts
// ABOUTME: Server identifiers, offset encodings, triggers and normalized popup matches

use std::fmt;
use std::sync::Arc;

use lsp_types as lsp;
use serde::{Deserialize, Serialize};

/// Identifier of an attached language server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(pub u32);

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server#{}", self.0)
    }
}

/// Code unit a server counts `Position::character` in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetEncoding {
    /// Byte offsets, identical to editor columns
    Utf8,
    /// The LSP default
    #[default]
    Utf16,
    /// Unicode scalar values
    Utf32,
}

impl OffsetEncoding {
    /// Map a negotiated `positionEncoding`. Unknown kinds fall back to UTF-16,
    /// which every server must support.
    pub fn from_position_encoding(kind: Option<&lsp::PositionEncodingKind>) -> Self {
        match kind.map(|kind| kind.as_str()) {
            Some("utf-8") => OffsetEncoding::Utf8,
            Some("utf-32") => OffsetEncoding::Utf32,
            _ => OffsetEncoding::Utf16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetEncoding::Utf8 => "utf-8",
            OffsetEncoding::Utf16 => "utf-16",
            OffsetEncoding::Utf32 => "utf-32",
        }
    }
}

/// Cursor in editor coordinates: zero based line, byte column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub line: u32,
    pub column: usize,
}

impl Cursor {
    pub fn new(line: u32, column: usize) -> Self {
        Self { line, column }
    }
}

/// What caused a completion request to be sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// Explicit request from the user
    Manual,
    /// A registered trigger character was typed
    Character(char),
    /// The previous result was incomplete
    Incomplete,
    /// Fresh results for a server that filters on its side while the popup is open
    Refresh,
    /// Text was deleted while re-trigger-on-delete is enabled
    Deletion,
}

impl CompletionTrigger {
    /// The `CompletionTriggerKind` reported to a server. Character triggers are
    /// only reported as such to servers that registered the character.
    pub fn lsp_kind(&self, registered: bool) -> lsp::CompletionTriggerKind {
        match self {
            CompletionTrigger::Character(_) if registered => {
                lsp::CompletionTriggerKind::TRIGGER_CHARACTER
            }
            CompletionTrigger::Incomplete => {
                lsp::CompletionTriggerKind::TRIGGER_FOR_INCOMPLETE_COMPLETIONS
            }
            _ => lsp::CompletionTriggerKind::INVOKED,
        }
    }

    pub fn character(&self) -> Option<char> {
        match self {
            CompletionTrigger::Character(ch) => Some(*ch),
            _ => None,
        }
    }
}

/// The raw candidate a match was built from, together with the server that sent it
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPayload {
    pub server: ServerId,
    pub item: lsp::CompletionItem,
}

impl CompletionPayload {
    pub fn new(server: ServerId, item: lsp::CompletionItem) -> Self {
        Self { server, item }
    }

    pub fn is_snippet(&self) -> bool {
        self.item.insert_text_format == Some(lsp::InsertTextFormat::SNIPPET)
    }

    /// Replacement text the server intends: the text edit, else a non-empty insert text
    pub fn replacement_text(&self) -> Option<&str> {
        match &self.item.text_edit {
            Some(lsp::CompletionTextEdit::Edit(edit)) => Some(edit.new_text.as_str()),
            Some(lsp::CompletionTextEdit::InsertAndReplace(edit)) => Some(edit.new_text.as_str()),
            None => self
                .item
                .insert_text
                .as_deref()
                .filter(|text| !text.is_empty()),
        }
    }
}

/// A candidate in the shape the popup widget consumes
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMatch {
    /// Filter prefix and literal insertion text
    pub word: String,
    /// Display label
    pub abbr: String,
    /// Display name of the item kind, empty when unknown
    pub kind: String,
    /// Secondary display text (the item detail)
    pub menu: String,
    pub icase: bool,
    pub dup: bool,
    pub empty: bool,
    /// Tells the host sorter not to re-rank by prefix length
    pub equal: bool,
    /// Opaque back-reference handed to the popup and returned on acceptance
    pub payload: Arc<CompletionPayload>,
}

impl NormalizedMatch {
    pub fn server(&self) -> ServerId {
        self.payload.server
    }

    pub fn item(&self) -> &lsp::CompletionItem {
        &self.payload.item
    }
}

/// Display name of a completion item kind. Unknown or missing kinds map to "".
pub fn kind_name(kind: Option<lsp::CompletionItemKind>) -> &'static str {
    use lsp::CompletionItemKind as Kind;

    match kind {
        Some(Kind::TEXT) => "Text",
        Some(Kind::METHOD) => "Method",
        Some(Kind::FUNCTION) => "Function",
        Some(Kind::CONSTRUCTOR) => "Constructor",
        Some(Kind::FIELD) => "Field",
        Some(Kind::VARIABLE) => "Variable",
        Some(Kind::CLASS) => "Class",
        Some(Kind::INTERFACE) => "Interface",
        Some(Kind::MODULE) => "Module",
        Some(Kind::PROPERTY) => "Property",
        Some(Kind::UNIT) => "Unit",
        Some(Kind::VALUE) => "Value",
        Some(Kind::ENUM) => "Enum",
        Some(Kind::KEYWORD) => "Keyword",
        Some(Kind::SNIPPET) => "Snippet",
        Some(Kind::COLOR) => "Color",
        Some(Kind::FILE) => "File",
        Some(Kind::REFERENCE) => "Reference",
        Some(Kind::FOLDER) => "Folder",
        Some(Kind::ENUM_MEMBER) => "EnumMember",
        Some(Kind::CONSTANT) => "Constant",
        Some(Kind::STRUCT) => "Struct",
        Some(Kind::EVENT) => "Event",
        Some(Kind::OPERATOR) => "Operator",
        Some(Kind::TYPE_PARAMETER) => "TypeParameter",
        _ => "",
    }
}
