// ABOUTME: Ordered snippet engine providers queried at expansion time
// ABOUTME: The first available provider wins; availability may change during a session

use crate::host::SnippetEngine;

#[derive(Default)]
pub(crate) struct SnippetProviders {
    engines: Vec<Box<dyn SnippetEngine>>,
}

impl SnippetProviders {
    pub(crate) fn push(&mut self, engine: Box<dyn SnippetEngine>) {
        self.engines.push(engine);
    }

    pub(crate) fn has_available(&self) -> bool {
        self.engines.iter().any(|engine| engine.is_available())
    }

    /// Expand with the first available provider. Returns its name, or `None` if none is available.
    pub(crate) fn expand(&mut self, template: &str) -> Option<String> {
        let engine = self
            .engines
            .iter_mut()
            .find(|engine| engine.is_available())?;
        engine.expand(template);
        Some(engine.name().to_string())
    }
}

/// Escape text so a snippet engine inserts it literally
pub fn escape_snippet_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '$' | '}') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
