//! Workflow error types.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::calls::CallKind;
use super::state::WorkflowState;
use crate::document::{DetectionError, DocxError, TransformError};
use crate::gateway::GatewayError;
use crate::version::VersionError;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Machine-readable failure class carried on error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    /// Gateway unreachable or returned a non-success response
    Transport,
    /// A gateway call exceeded its bounded wait
    Timeout,
    /// Input or metadata failed validation before any write
    Validation,
    /// Local processing of the document failed
    Processing,
    /// Controller invariant violated
    Internal,
}

/// Errors that end a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Gateway call failed in transport.
    #[error("{operation} failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: GatewayError,
    },

    /// Gateway answered with `success: false`.
    #[error("{operation} was rejected: {message}")]
    Rejected { operation: &'static str, message: String },

    /// Gateway call exceeded its bounded wait.
    #[error("{operation} timed out after {} seconds", .after.as_secs())]
    Timeout { operation: &'static str, after: Duration },

    #[error("DOCX processing failed: {0}")]
    Docx(#[from] DocxError),

    #[error("Suggestion detection failed: {0}")]
    Detection(#[from] DetectionError),

    #[error("XML transformation failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Version identifier error: {0}")]
    Version(#[from] VersionError),

    /// Metadata failed validation.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// A value an earlier phase should have produced is absent.
    #[error("Workflow data is missing {0}")]
    MissingData(&'static str),

    #[error("Illegal state transition {from} -> {to}")]
    IllegalTransition { from: WorkflowState, to: WorkflowState },

    /// No async runtime to run the phase on.
    #[error("No async runtime available to run the workflow")]
    NoRuntime,

    /// The run was reset while this work was in flight.
    #[error("Workflow run was superseded")]
    Superseded,
}

impl WorkflowError {
    pub(crate) fn transport(kind: CallKind, source: GatewayError) -> Self {
        Self::Transport { operation: kind.label(), source }
    }

    pub(crate) fn rejected(kind: CallKind, message: Option<String>) -> Self {
        Self::Rejected {
            operation: kind.label(),
            message: message.unwrap_or_else(|| "no error message returned".to_string()),
        }
    }

    /// Classify for observers.
    pub fn cause(&self) -> ErrorCause {
        match self {
            Self::Transport { .. } | Self::Rejected { .. } => ErrorCause::Transport,
            Self::Timeout { .. } => ErrorCause::Timeout,
            Self::Validation(_) | Self::Version(_) => ErrorCause::Validation,
            Self::Docx(_) | Self::Detection(_) | Self::Transform(_) | Self::MissingData(_) => {
                ErrorCause::Processing
            }
            Self::IllegalTransition { .. } | Self::NoRuntime | Self::Superseded => {
                ErrorCause::Internal
            }
        }
    }

    /// Raw payload for the error event, when there is one.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Transport { source, .. } => Some(source.to_string()),
            Self::Rejected { message, .. } => Some(message.clone()),
            Self::Validation(errors) => Some(errors.join("\n")),
            _ => None,
        }
    }

    /// Failures a configured retry policy may repeat. Timeouts never retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = WorkflowError::Timeout { operation: "Export", after: Duration::from_secs(30) };
        assert_eq!(err.to_string(), "Export timed out after 30 seconds");
        assert_eq!(err.cause(), ErrorCause::Timeout);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_rejected_carries_payload() {
        let err = WorkflowError::rejected(CallKind::Replace, Some("quota exceeded".into()));
        assert_eq!(err.cause(), ErrorCause::Transport);
        assert_eq!(err.detail().as_deref(), Some("quota exceeded"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_validation_message() {
        let err = WorkflowError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");
        assert_eq!(err.cause(), ErrorCause::Validation);
    }
}
