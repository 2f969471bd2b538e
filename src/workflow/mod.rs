//! The pausable three-phase document workflow.
//!
//! ## Phases
//!
//! 1. Export the live document, unpack it and detect tracked changes, then
//!    pause so the user can save the "Before" version.
//! 2. Rewrite every suggestion as visible markup, rebuild the DOCX and
//!    replace the live document, then pause for the "After" version.
//! 3. Optionally record an official version in the version history.
//!
//! [`WorkflowController`] drives the run; observers follow it through
//! [`WorkflowEvent`]s or a state watch channel.

mod calls;
mod clipboard;
mod controller;
mod data;
mod error;
mod events;
mod state;

pub use calls::{CallId, CallKind, CallTracker};
pub use clipboard::{Clipboard, ClipboardError, LogClipboard, MemoryClipboard};
pub use controller::{WorkflowController, WorkflowControllerBuilder};
pub use data::{CompletionSummary, Phase1Data, Phase2Data, Phase3Data, ResumeInput, WorkflowData};
pub use error::{ErrorCause, WorkflowError, WorkflowResult};
pub use events::WorkflowEvent;
pub use state::WorkflowState;
