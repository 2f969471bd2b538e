//! # MIGOP
//!
//! Pausable multi-phase workflow that turns the tracked changes of a DOCX
//! document into visible markup and versions the result.
//!
//! ## Features
//!
//! - **Suggestion detection**: Finds tracked insertions and deletions in WordprocessingML
//! - **Visible markup**: Rewrites them as colored underline and strikethrough runs
//! - **Version identifiers**: `counter:type:YY:MM:DD:HH:MM:SS` for Before, After and Official versions
//! - **Version history**: Validated, sanitized history entries for official versions
//!
//! ## Quick Start
//!
//! ```bash
//! # Process a document, pausing at each version point
//! migop run report.docx
//!
//! # Decode a version identifier
//! migop version parse 1:B:25:10:04:09:15:30
//! ```

#![forbid(unsafe_code)]

pub mod core;
pub mod document;
pub mod gateway;
pub mod version;
pub mod workflow;

// Re-export commonly used types
pub use core::Config;
pub use document::{Suggestion, SuggestionKind};
pub use gateway::{DocumentGateway, FileGateway};
pub use version::{VersionHistoryEntry, VersionIdentifier, VersionType};
pub use workflow::{ResumeInput, WorkflowController, WorkflowData, WorkflowEvent, WorkflowState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "migop";
