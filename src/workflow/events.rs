//! Events delivered to workflow observers.
//!
//! Each subscriber receives every event in emission order over its own
//! unbounded channel. Closed subscribers are dropped on the next emission.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::data::{CompletionSummary, WorkflowData};
use super::error::ErrorCause;
use super::state::WorkflowState;

/// Something observers should know about.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// The controller moved between states.
    StateChanged { old: WorkflowState, new: WorkflowState, data: WorkflowData },

    /// Advisory progress text.
    Status { state: WorkflowState, message: String },

    /// The run failed and is now in `Error`.
    Failed {
        message: String,
        cause: ErrorCause,
        detail: Option<String>,
        /// State the run was in when it failed
        state: WorkflowState,
        data: WorkflowData,
    },

    /// The run finished.
    Completed { summary: CompletionSummary },
}

/// Fan-out of events to subscribers.
#[derive(Debug, Default)]
pub(crate) struct EventBus {
    subscribers: Vec<UnboundedSender<WorkflowEvent>>,
}

impl EventBus {
    pub(crate) fn subscribe(&mut self) -> UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn emit(&mut self, event: &WorkflowEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
