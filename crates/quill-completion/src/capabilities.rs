// ABOUTME: Client capabilities the engine relies on, for the host's initialize request
// ABOUTME: Snippet support, lazily resolved fields, item defaults and signature help

use serde_json::{Value, json};

/// Item fields the engine fetches through `completionItem/resolve`
pub const RESOLVE_PROPERTIES: &[&str] = &["additionalTextEdits"];

/// Response-level item defaults the engine merges into items
pub const ITEM_DEFAULTS: &[&str] = &[
    "commitCharacters",
    "editRange",
    "insertTextFormat",
    "insertTextMode",
    "data",
];

/// The `textDocument` client capabilities fragment for completion and signature help
pub fn client_capabilities() -> Value {
    json!({
        "textDocument": {
            "completion": {
                "dynamicRegistration": false,
                "contextSupport": true,
                "completionItem": {
                    "snippetSupport": true,
                    "commitCharactersSupport": false,
                    "deprecatedSupport": true,
                    "preselectSupport": false,
                    "insertReplaceSupport": true,
                    "labelDetailsSupport": false,
                    "documentationFormat": ["markdown", "plaintext"],
                    "resolveSupport": {
                        "properties": RESOLVE_PROPERTIES,
                    },
                    "insertTextModeSupport": {
                        "valueSet": [1],
                    },
                },
                "completionList": {
                    "itemDefaults": ITEM_DEFAULTS,
                },
            },
            "signatureHelp": {
                "dynamicRegistration": false,
                "contextSupport": true,
                "signatureInformation": {
                    "documentationFormat": ["markdown", "plaintext"],
                    "activeParameterSupport": true,
                    "parameterInformation": {
                        "labelOffsetSupport": true,
                    },
                },
            },
        },
        "general": {
            "positionEncodings": ["utf-8", "utf-16", "utf-32"],
        },
    })
}
