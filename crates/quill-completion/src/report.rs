// ABOUTME: De-duplicating front for user-facing warnings and errors
// ABOUTME: Each distinct message reaches the notifier once per engine

use std::collections::HashSet;

use quill_logging::warn;

use crate::host::{Notifier, NotifyLevel};

#[derive(Debug, Default)]
pub(crate) struct ErrorReporter {
    seen: HashSet<String>,
}

impl ErrorReporter {
    /// Forward `message` unless it was reported before. Returns whether it was forwarded.
    pub(crate) fn report(
        &mut self,
        notifier: &mut dyn Notifier,
        level: NotifyLevel,
        message: String,
    ) -> bool {
        if self.seen.contains(&message) {
            return false;
        }
        warn!(?level, %message, "Reporting completion problem");
        notifier.notify(level, &message);
        self.seen.insert(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Vec<(NotifyLevel, String)>);

    impl Notifier for Collect {
        fn notify(&mut self, level: NotifyLevel, message: &str) {
            self.0.push((level, message.to_string()));
        }
    }

    #[test]
    fn test_reports_each_message_once() {
        let mut reporter = ErrorReporter::default();
        let mut notifier = Collect::default();

        assert!(reporter.report(&mut notifier, NotifyLevel::Error, "boom".into()));
        assert!(!reporter.report(&mut notifier, NotifyLevel::Error, "boom".into()));
        assert!(reporter.report(&mut notifier, NotifyLevel::Warning, "other".into()));

        assert_eq!(
            notifier.0,
            vec![
                (NotifyLevel::Error, "boom".to_string()),
                (NotifyLevel::Warning, "other".to_string())
            ]
        );
    }
}
