//! Workflow states and the transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of the controller in the three-phase workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowState {
    #[default]
    #[serde(rename = "IDLE")]
    Idle,
    #[serde(rename = "P1_EXPORTING")]
    P1Exporting,
    #[serde(rename = "P1_ANALYZING")]
    P1Analyzing,
    #[serde(rename = "VERSION_1_PAUSE")]
    Version1Pause,
    #[serde(rename = "P2_TRANSFORMING")]
    P2Transforming,
    #[serde(rename = "P2_REBUILDING")]
    P2Rebuilding,
    #[serde(rename = "P2_REPLACING")]
    P2Replacing,
    #[serde(rename = "VERSION_2_PAUSE")]
    Version2Pause,
    #[serde(rename = "P3_FINALIZING")]
    P3Finalizing,
    #[serde(rename = "COMPLETE")]
    Complete,
    #[serde(rename = "ERROR")]
    Error,
}

impl WorkflowState {
    /// Every state, in workflow order.
    pub const ALL: [WorkflowState; 11] = [
        WorkflowState::Idle,
        WorkflowState::P1Exporting,
        WorkflowState::P1Analyzing,
        WorkflowState::Version1Pause,
        WorkflowState::P2Transforming,
        WorkflowState::P2Rebuilding,
        WorkflowState::P2Replacing,
        WorkflowState::Version2Pause,
        WorkflowState::P3Finalizing,
        WorkflowState::Complete,
        WorkflowState::Error,
    ];

    /// States reachable from `self` without `reset`.
    ///
    /// `Error` is reachable from every non-terminal state.
    pub fn allowed_transitions(self) -> &'static [WorkflowState] {
        use WorkflowState::*;
        match self {
            Idle => &[P1Exporting],
            P1Exporting => &[P1Analyzing, Error],
            P1Analyzing => &[Version1Pause, Error],
            Version1Pause => &[P2Transforming, Error],
            P2Transforming => &[P2Rebuilding, Error],
            P2Rebuilding => &[P2Replacing, Error],
            P2Replacing => &[Version2Pause, Error],
            Version2Pause => &[Complete, P3Finalizing, Error],
            P3Finalizing => &[Complete, Error],
            Complete | Error => &[],
        }
    }

    /// Check if transition is valid
    pub fn can_transition_to(self, target: WorkflowState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, WorkflowState::Version1Pause | WorkflowState::Version2Pause)
    }

    /// Complete or Error.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Complete | WorkflowState::Error)
    }

    /// A phase is executing.
    pub fn is_busy(self) -> bool {
        !matches!(self, WorkflowState::Idle) && !self.is_paused() && !self.is_terminal()
    }

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Idle => "IDLE",
            WorkflowState::P1Exporting => "P1_EXPORTING",
            WorkflowState::P1Analyzing => "P1_ANALYZING",
            WorkflowState::Version1Pause => "VERSION_1_PAUSE",
            WorkflowState::P2Transforming => "P2_TRANSFORMING",
            WorkflowState::P2Rebuilding => "P2_REBUILDING",
            WorkflowState::P2Replacing => "P2_REPLACING",
            WorkflowState::Version2Pause => "VERSION_2_PAUSE",
            WorkflowState::P3Finalizing => "P3_FINALIZING",
            WorkflowState::Complete => "COMPLETE",
            WorkflowState::Error => "ERROR",
        }
    }

    /// Short description for status displays.
    pub fn description(self) -> &'static str {
        match self {
            WorkflowState::Idle => "Ready",
            WorkflowState::P1Exporting => "Exporting document",
            WorkflowState::P1Analyzing => "Analyzing suggestions",
            WorkflowState::Version1Pause => "Waiting: create the Before version",
            WorkflowState::P2Transforming => "Transforming XML",
            WorkflowState::P2Rebuilding => "Rebuilding DOCX",
            WorkflowState::P2Replacing => "Replacing document",
            WorkflowState::Version2Pause => "Waiting: create the After version",
            WorkflowState::P3Finalizing => "Writing version history",
            WorkflowState::Complete => "Complete",
            WorkflowState::Error => "Failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
