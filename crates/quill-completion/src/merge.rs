// ABOUTME: Fan-in of per-server completion responses into one popup list
// ABOUTME: Item defaults, boundary reconciliation, normalization, filtering and ordering

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use quill_logging::{PerfTimer, debug};
use quill_types::lsp;
use quill_types::{CompletionPayload, NormalizedMatch, OffsetEncoding, ResponseError, ServerId};
use serde_json::{Map, Value};

use crate::binding::ClientBinding;
use crate::boundary::resolve_start;
use crate::fuzzy::FuzzyMatcher;
use crate::normalize::normalize;

/// Items of one server's response after item defaults were applied
#[derive(Debug, Default)]
pub struct CompletionResponse {
    pub items: Vec<lsp::CompletionItem>,
    pub is_incomplete: bool,
}

/// Where the merge happens: the cursor line as it is when all responses are in
#[derive(Debug, Clone, Copy)]
pub struct MergeRequest<'a> {
    pub line_number: u32,
    pub line: &'a str,
    pub cursor_column: usize,
    pub naive_start: usize,
}

#[derive(Debug, Default)]
pub struct MergedCompletions {
    pub matches: Vec<NormalizedMatch>,
    pub start_column: usize,
    pub is_incomplete: bool,
    /// Servers that answered with an error; their items are omitted
    pub errors: Vec<(ServerId, ResponseError)>,
}

/// Parse a `textDocument/completion` result: null, an item array or a completion list
pub fn parse_response(value: Value) -> CompletionResponse {
    let (raw_items, is_incomplete, defaults) = match value {
        Value::Null => return CompletionResponse::default(),
        Value::Array(items) => (items, false, None),
        Value::Object(mut list) => {
            let is_incomplete = list
                .get("isIncomplete")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let items = match list.remove("items") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            let defaults = match list.remove("itemDefaults") {
                Some(Value::Object(defaults)) => Some(defaults),
                _ => None,
            };
            (items, is_incomplete, defaults)
        }
        other => {
            debug!(response = %other, "Ignoring malformed completion response");
            return CompletionResponse::default();
        }
    };

    let items = raw_items
        .into_iter()
        .filter_map(|mut raw| {
            if let (Some(defaults), Value::Object(item)) = (&defaults, &mut raw) {
                apply_item_defaults(item, defaults);
            }
            match serde_json::from_value::<lsp::CompletionItem>(raw) {
                Ok(item) => Some(item),
                Err(err) => {
                    debug!(error = %err, "Skipping invalid completion item");
                    None
                }
            }
        })
        .collect();

    CompletionResponse {
        items,
        is_incomplete,
    }
}

/// Fill fields missing on `item` from the list's `itemDefaults`. Present fields win.
///
/// `editRange` becomes a text edit whose text is `textEditText`, else `insertText`,
/// else the label.
pub fn apply_item_defaults(item: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, value) in defaults {
        if key == "editRange" {
            if item.contains_key("textEdit") {
                continue;
            }
            let new_text = ["textEditText", "insertText", "label"]
                .into_iter()
                .find_map(|field| item.get(field).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string();
            let text_edit = match value {
                Value::Object(range) if range.contains_key("insert") => {
                    let mut edit = range.clone();
                    edit.insert("newText".into(), Value::String(new_text));
                    Value::Object(edit)
                }
                range => serde_json::json!({ "range": range, "newText": new_text }),
            };
            item.insert("textEdit".into(), text_edit);
        } else if !item.contains_key(key) {
            item.insert(key.clone(), value.clone());
        }
    }
}

/// Merge every server's reply for one request cycle
pub fn merge_responses(
    request: MergeRequest<'_>,
    responses: BTreeMap<ServerId, Result<Value, ResponseError>>,
    bindings: &BTreeMap<ServerId, ClientBinding>,
    matcher: &mut dyn FuzzyMatcher,
) -> MergedCompletions {
    let _timer = PerfTimer::new("completion.merge").with_warn_threshold(Duration::from_millis(50));

    let mut merged = MergedCompletions::default();
    let mut parsed = Vec::new();
    let mut opinions = Vec::new();

    for (server, result) in responses {
        let response = match result {
            Ok(value) => parse_response(value),
            Err(error) => {
                merged.errors.push((server, error));
                continue;
            }
        };
        let (encoding, fuzzy) = bindings
            .get(&server)
            .map_or((OffsetEncoding::default(), false), |binding| {
                (binding.encoding, binding.fuzzy)
            });

        if let Some(start) = resolve_start(
            request.line_number,
            request.line,
            &response.items,
            encoding,
        ) {
            opinions.push(start);
        }
        merged.is_incomplete |= response.is_incomplete;
        parsed.push((server, fuzzy, response.items));
    }

    merged.start_column = match opinions.split_first() {
        Some((first, rest)) if rest.iter().all(|start| start == first) => *first,
        _ => request.naive_start,
    };

    let offset = if merged.start_column < request.naive_start {
        request
            .line
            .get(merged.start_column..request.naive_start)
            .map_or(0, |between| between.chars().count())
    } else {
        0
    };
    let prefix = request
        .line
        .get(merged.start_column..request.cursor_column)
        .unwrap_or_default();

    for (server, fuzzy, items) in parsed {
        for item in items {
            let normalized = normalize(Arc::new(CompletionPayload::new(server, item)), fuzzy, offset);
            if fuzzy && !prefix.is_empty() {
                let haystack = normalized
                    .item()
                    .filter_text
                    .as_deref()
                    .unwrap_or(&normalized.word);
                if !matcher.is_match(prefix, haystack) {
                    continue;
                }
            }
            merged.matches.push(normalized);
        }
    }

    merged.matches.sort_by(|a, b| sort_key(a).cmp(sort_key(b)));

    debug!(
        items = merged.matches.len(),
        start_column = merged.start_column,
        is_incomplete = merged.is_incomplete,
        errors = merged.errors.len(),
        "Merged completion responses"
    );

    merged
}

fn sort_key(entry: &NormalizedMatch) -> &str {
    let item = entry.item();
    item.sort_text.as_deref().unwrap_or(&item.label)
}
