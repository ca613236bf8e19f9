// ABOUTME: Cross-crate event definitions for decoupled communication
// ABOUTME: Completion lifecycle events and the subscriber fan-out that delivers them

pub mod completion;
pub mod event_bus;

pub use event_bus::{CompletionEventBus, EventBus};
