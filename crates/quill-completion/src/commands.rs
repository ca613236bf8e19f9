// ABOUTME: Handlers for commands attached to completion items
// ABOUTME: Client-local handlers, a shared global registry and follow-up actions

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use quill_types::ServerId;
use quill_types::lsp;

/// Work the engine performs after a command handler returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    TriggerCompletion,
    TriggerSignatureHelp,
}

pub type CommandHandler = Arc<dyn Fn(&lsp::Command, ServerId) -> Option<FollowUp> + Send + Sync>;

/// Command handlers shared by every engine of a host
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: Arc<RwLock<HashMap<String, CommandHandler>>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with handlers for the editor commands servers commonly attach to items
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("editor.action.triggerSuggest", |_, _| {
            Some(FollowUp::TriggerCompletion)
        });
        registry.register("editor.action.triggerParameterHints", |_, _| {
            Some(FollowUp::TriggerSignatureHelp)
        });
        registry
    }

    pub fn register(
        &self,
        command: impl Into<String>,
        handler: impl Fn(&lsp::Command, ServerId) -> Option<FollowUp> + Send + Sync + 'static,
    ) {
        self.handlers
            .write()
            .insert(command.into(), Arc::new(handler));
    }

    pub fn unregister(&self, command: &str) -> bool {
        self.handlers.write().remove(command).is_some()
    }

    pub fn get(&self, command: &str) -> Option<CommandHandler> {
        self.handlers.read().get(command).cloned()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let mut names: Vec<_> = handlers.keys().collect();
        names.sort();
        f.debug_struct("CommandRegistry")
            .field("commands", &names)
            .finish()
    }
}
