// ABOUTME: Per-server binding created when a language server attaches to a buffer
// ABOUTME: Offset encoding, trigger characters, resolve and command support, debounce windows

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use quill_types::lsp;
use quill_types::{AttachOptions, CompletionConfig, OffsetEncoding, ServerId};
use smallvec::SmallVec;

use crate::commands::CommandHandler;

pub type TriggerChars = SmallVec<[char; 4]>;

/// What one attached server can do for this buffer
pub struct ClientBinding {
    pub server: ServerId,
    pub encoding: OffsetEncoding,
    /// Server filters on its side; results are refreshed on every keystroke
    pub fuzzy: bool,
    pub resolve_provider: bool,
    pub completion_provider: bool,
    pub trigger_characters: TriggerChars,
    pub signature_help_provider: bool,
    pub signature_trigger_characters: TriggerChars,
    /// Commands the server executes through `workspace/executeCommand`
    pub commands: HashSet<String>,
    pub leading_debounce: Duration,
    pub subsequent_debounce: Option<Duration>,
    pub(crate) local_commands: HashMap<String, CommandHandler>,
}

impl ClientBinding {
    pub fn new(
        server: ServerId,
        capabilities: &lsp::ServerCapabilities,
        options: &AttachOptions,
        config: &CompletionConfig,
    ) -> Self {
        let completion = capabilities.completion_provider.as_ref();
        let signature = capabilities.signature_help_provider.as_ref();

        let mut signature_trigger_characters =
            trigger_chars(signature.and_then(|sig| sig.trigger_characters.as_deref()));
        for ch in trigger_chars(signature.and_then(|sig| sig.retrigger_characters.as_deref())) {
            if !signature_trigger_characters.contains(&ch) {
                signature_trigger_characters.push(ch);
            }
        }

        Self {
            server,
            encoding: OffsetEncoding::from_position_encoding(
                capabilities.position_encoding.as_ref(),
            ),
            fuzzy: options.fuzzy(config),
            resolve_provider: completion
                .and_then(|opts| opts.resolve_provider)
                .unwrap_or(false),
            completion_provider: completion.is_some(),
            trigger_characters: trigger_chars(
                completion.and_then(|opts| opts.trigger_characters.as_deref()),
            ),
            signature_help_provider: signature.is_some(),
            signature_trigger_characters,
            commands: capabilities
                .execute_command_provider
                .as_ref()
                .map(|provider| provider.commands.iter().cloned().collect())
                .unwrap_or_default(),
            leading_debounce: options.leading_debounce(config),
            subsequent_debounce: options.subsequent_debounce(config),
            local_commands: HashMap::new(),
        }
    }

    pub fn is_trigger_character(&self, ch: char) -> bool {
        self.completion_provider && self.trigger_characters.contains(&ch)
    }

    pub fn is_signature_trigger_character(&self, ch: char) -> bool {
        self.signature_help_provider && self.signature_trigger_characters.contains(&ch)
    }

    pub fn supports_command(&self, command: &str) -> bool {
        self.commands.contains(command)
    }
}

impl std::fmt::Debug for ClientBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBinding")
            .field("server", &self.server)
            .field("encoding", &self.encoding)
            .field("fuzzy", &self.fuzzy)
            .field("resolve_provider", &self.resolve_provider)
            .field("trigger_characters", &self.trigger_characters)
            .field(
                "signature_trigger_characters",
                &self.signature_trigger_characters,
            )
            .field("commands", &self.commands)
            .field("local_commands", &self.local_commands.len())
            .finish()
    }
}

/// Trigger strings are matched on their final character, which is the one just typed
fn trigger_chars(triggers: Option<&[String]>) -> TriggerChars {
    let mut chars = TriggerChars::new();
    for ch in triggers
        .unwrap_or_default()
        .iter()
        .filter_map(|trigger| trigger.chars().last())
    {
        if !chars.contains(&ch) {
            chars.push(ch);
        }
    }
    chars
}
