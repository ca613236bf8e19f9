// ABOUTME: Determines where the replaced text starts on the current line
// ABOUTME: Naive word scan plus the authoritative start taken from server text edits

use quill_types::OffsetEncoding;
use quill_types::lsp;

use crate::position::character_to_byte;

/// Start of the identifier left of `cursor`: the editor's own guess at the boundary
pub fn naive_start(line: &str, cursor: usize) -> usize {
    let mut cursor = cursor.min(line.len());
    while !line.is_char_boundary(cursor) {
        cursor -= 1;
    }

    line[..cursor]
        .char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_alphanumeric() || *ch == '_')
        .last()
        .map_or(cursor, |(idx, _)| idx)
}

/// Byte column at which a server's text edits start replacing.
///
/// Only edits on `line_number` count. Returns `None` when no edit is on the line,
/// when edits disagree on the start, or when an edit's start lies after its end.
pub fn resolve_start(
    line_number: u32,
    line: &str,
    items: &[lsp::CompletionItem],
    encoding: OffsetEncoding,
) -> Option<usize> {
    let mut start: Option<u32> = None;

    for item in items {
        let Some(range) = edit_range(item) else {
            continue;
        };
        if range.start.line != line_number {
            continue;
        }
        if range.start.character > range.end.character {
            return None;
        }
        match start {
            Some(agreed) if agreed != range.start.character => return None,
            Some(_) => {}
            None => start = Some(range.start.character),
        }
    }

    start.map(|character| character_to_byte(line, character, encoding))
}

/// The range the text edit replaces when the candidate is inserted
pub fn edit_range(item: &lsp::CompletionItem) -> Option<lsp::Range> {
    match item.text_edit.as_ref()? {
        lsp::CompletionTextEdit::Edit(edit) => Some(edit.range),
        lsp::CompletionTextEdit::InsertAndReplace(edit) => Some(edit.insert),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_edit(line: u32, start: u32, end: u32) -> lsp::CompletionItem {
        lsp::CompletionItem {
            label: "x".into(),
            text_edit: Some(lsp::CompletionTextEdit::Edit(lsp::TextEdit::new(
                lsp::Range::new(
                    lsp::Position::new(line, start),
                    lsp::Position::new(line, end),
                ),
                "x".into(),
            ))),
            ..Default::default()
        }
    }

    #[test]
    fn test_naive_start_scans_identifier() {
        assert_eq!(naive_start("foo.bar_baz", 11), 4);
        assert_eq!(naive_start("foo.", 4), 4);
        assert_eq!(naive_start("a", 1), 0);
        assert_eq!(naive_start("", 0), 0);
        assert_eq!(naive_start("  größe", 8), 2);
    }

    #[test]
    fn test_agreeing_edits_resolve() {
        let items = vec![with_edit(2, 4, 6), with_edit(2, 4, 7), lsp::CompletionItem::default()];
        assert_eq!(resolve_start(2, "foo.ba", &items, OffsetEncoding::Utf16), Some(4));
    }

    #[test]
    fn test_disagreement_has_no_opinion() {
        let items = vec![with_edit(0, 4, 6), with_edit(0, 3, 6)];
        assert_eq!(resolve_start(0, "foo.ba", &items, OffsetEncoding::Utf16), None);
    }

    #[test]
    fn test_inverted_range_has_no_opinion() {
        let items = vec![with_edit(0, 5, 2)];
        assert_eq!(resolve_start(0, "foo.ba", &items, OffsetEncoding::Utf16), None);
    }

    #[test]
    fn test_multiline_edit_compares_columns() {
        let item = lsp::CompletionItem {
            label: "x".into(),
            text_edit: Some(lsp::CompletionTextEdit::Edit(lsp::TextEdit::new(
                lsp::Range::new(lsp::Position::new(0, 5), lsp::Position::new(1, 2)),
                "x".into(),
            ))),
            ..Default::default()
        };
        assert_eq!(resolve_start(0, "abcdefgh", &[item], OffsetEncoding::Utf16), None);
    }

    #[test]
    fn test_edits_on_other_lines_are_ignored() {
        let items = vec![with_edit(1, 0, 3)];
        assert_eq!(resolve_start(0, "foo", &items, OffsetEncoding::Utf16), None);
    }

    #[test]
    fn test_start_converted_from_server_encoding() {
        // "é" is one UTF-16 unit but two bytes
        let items = vec![with_edit(0, 2, 4)];
        assert_eq!(resolve_start(0, "é.ab", &items, OffsetEncoding::Utf16), Some(3));
        assert_eq!(resolve_start(0, "é.ab", &items, OffsetEncoding::Utf8), Some(2));
    }

    #[test]
    fn test_insert_replace_uses_insert_range() {
        let item = lsp::CompletionItem {
            label: "x".into(),
            text_edit: Some(lsp::CompletionTextEdit::InsertAndReplace(
                lsp::InsertReplaceEdit {
                    new_text: "x".into(),
                    insert: lsp::Range::new(lsp::Position::new(0, 2), lsp::Position::new(0, 3)),
                    replace: lsp::Range::new(lsp::Position::new(0, 1), lsp::Position::new(0, 5)),
                },
            )),
            ..Default::default()
        };
        assert_eq!(resolve_start(0, "abcdef", &[item], OffsetEncoding::Utf16), Some(2));
    }
}
