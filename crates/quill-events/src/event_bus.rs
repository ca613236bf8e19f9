// ABOUTME: Event bus trait and channel-backed fan-out for completion events
// ABOUTME: Subscribers receive every event published after they subscribed

use tokio::sync::mpsc;

use crate::completion::Event as CompletionEvent;

/// Event bus trait for dispatching completion events
pub trait EventBus {
    /// Dispatch a completion event
    fn dispatch_completion(&mut self, event: CompletionEvent);
}

/// Fan-out of completion events to unbounded channel subscribers.
/// Closed receivers are pruned on the next dispatch.
#[derive(Debug, Default)]
pub struct CompletionEventBus {
    subscribers: Vec<mpsc::UnboundedSender<CompletionEvent>>,
}

impl CompletionEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<CompletionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl EventBus for CompletionEventBus {
    fn dispatch_completion(&mut self, event: CompletionEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
