// ABOUTME: Converts raw completion items into the records the popup displays and filters
// ABOUTME: Chooses the inserted word from text edits, insert text or the label

use std::sync::Arc;

use quill_types::lsp;
use quill_types::{CompletionPayload, NormalizedMatch, kind_name};

/// Build the popup record for one candidate.
///
/// `offset` is the number of characters between the server's replacement start
/// and the start of the word typed left of the cursor.
pub fn normalize(payload: Arc<CompletionPayload>, fuzzy: bool, offset: usize) -> NormalizedMatch {
    let item = &payload.item;
    let word = word_for(item, fuzzy, offset);

    NormalizedMatch {
        word,
        abbr: item.label.clone(),
        kind: kind_name(item.kind).to_string(),
        menu: item.detail.clone().unwrap_or_default(),
        icase: true,
        dup: true,
        empty: true,
        equal: fuzzy,
        payload,
    }
}

/// The literal text inserted when the candidate is selected
pub fn word_for(item: &lsp::CompletionItem, fuzzy: bool, offset: usize) -> String {
    let insert_text = item.insert_text.as_deref().filter(|text| !text.is_empty());

    if item.kind == Some(lsp::CompletionItemKind::SNIPPET) {
        return item.label.clone();
    }

    if item.insert_text_format == Some(lsp::InsertTextFormat::SNIPPET) {
        return match edit_text(item) {
            Some(new_text) if fuzzy || shares_first_char(new_text, offset, &item.label) => {
                new_text.to_string()
            }
            Some(_) => item.label.clone(),
            None => insert_text
                .map(leading_identifier)
                .filter(|word| !word.is_empty())
                .unwrap_or(item.label.as_str())
                .to_string(),
        };
    }

    match (edit_text(item), insert_text) {
        (Some(new_text), _) => leading_non_whitespace(new_text).to_string(),
        (None, Some(text)) => text.to_string(),
        (None, None) => item.label.clone(),
    }
}

fn edit_text(item: &lsp::CompletionItem) -> Option<&str> {
    match item.text_edit.as_ref()? {
        lsp::CompletionTextEdit::Edit(edit) => Some(&edit.new_text),
        lsp::CompletionTextEdit::InsertAndReplace(edit) => Some(&edit.new_text),
    }
}

/// Whether `new_text`, skipping the characters before the typed word, starts like `label`
fn shares_first_char(new_text: &str, offset: usize, label: &str) -> bool {
    match (new_text.chars().nth(offset), label.chars().next()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn leading_identifier(text: &str) -> &str {
    let end = text
        .find(|ch: char| !(ch.is_alphanumeric() || ch == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

fn leading_non_whitespace(text: &str) -> &str {
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    &text[..end]
}
