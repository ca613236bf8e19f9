// ABOUTME: Single-shot debounce timers that post back into the engine's message queue
// ABOUTME: Dropping a timer cancels it, so replacing one tears the previous down

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::message::{EngineMessage, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerKind {
    Completion,
    SignatureHelp,
}

/// An armed timer. It fires at most once and never after it has been dropped.
#[derive(Debug)]
pub(crate) struct DebounceTimer {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl DebounceTimer {
    pub(crate) fn spawn(
        runtime: &Handle,
        kind: TimerKind,
        delay: Duration,
        tx: UnboundedSender<EngineMessage>,
    ) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let task = runtime.spawn(async move {
            tokio::select! {
                _ = task_token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = tx.send(EngineMessage::new(Message::TimerElapsed {
                        kind,
                        token: task_token,
                    }));
                }
            }
        });

        Self { token, task }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.token.cancel();
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _timer = DebounceTimer::spawn(
            &Handle::current(),
            TimerKind::Completion,
            Duration::from_millis(25),
            tx,
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(20)).await;
        let message = rx.try_recv().unwrap();
        assert!(matches!(
            message.inner,
            Message::TimerElapsed {
                kind: TimerKind::Completion,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_timer_never_fires() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let timer = DebounceTimer::spawn(
            &Handle::current(),
            TimerKind::SignatureHelp,
            Duration::from_millis(25),
            tx,
        );
        drop(timer);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }
}
