//! The per-run workflow record and user input at pause points.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::{DocxPackage, Suggestion, SuggestionKind};
use crate::version::VersionIdentifier;

/// Everything one workflow run produces.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowData {
    /// Identifies this run in logs and events
    pub run_id: Option<Uuid>,
    /// Counter shared by every identifier of the run
    pub version_counter: Option<u64>,
    pub phase1: Phase1Data,
    pub phase2: Phase2Data,
    pub phase3: Phase3Data,
    /// Set on completion
    pub summary: Option<CompletionSummary>,
}

/// Export and analysis results.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase1Data {
    #[serde(skip)]
    pub exported_docx_base64: Option<String>,
    #[serde(skip)]
    pub document_xml: Option<String>,
    pub suggestions: Vec<Suggestion>,
    pub version_number: Option<VersionIdentifier>,
    /// Unpacked container reused to rebuild the document
    #[serde(skip)]
    pub package: Option<Arc<DocxPackage>>,
}

/// Transformation and replacement results.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase2Data {
    #[serde(skip)]
    pub modified_xml: Option<String>,
    #[serde(skip)]
    pub rebuilt_docx_base64: Option<String>,
    pub version_number: Option<VersionIdentifier>,
    pub is_official: bool,
}

/// Official-version metadata.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase3Data {
    pub committee: Option<String>,
    pub comments: Option<String>,
    pub timestamp: Option<String>,
    pub version_number: Option<VersionIdentifier>,
}

/// Final counts recorded when a run completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub suggestions_count: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub is_official: bool,
    /// Last identifier generated in the run
    pub final_version: Option<VersionIdentifier>,
}

impl WorkflowData {
    /// Empty record for a new run.
    pub fn for_run(run_id: Uuid) -> Self {
        Self { run_id: Some(run_id), ..Self::default() }
    }

    /// Insertion and deletion counts from Phase 1.
    pub fn suggestion_counts(&self) -> (usize, usize) {
        let insertions =
            self.phase1.suggestions.iter().filter(|s| s.kind == SuggestionKind::Insertion).count();
        (insertions, self.phase1.suggestions.len() - insertions)
    }

    pub(crate) fn summarize(&self) -> CompletionSummary {
        let (insertions, deletions) = self.suggestion_counts();
        CompletionSummary {
            suggestions_count: self.phase1.suggestions.len(),
            insertions,
            deletions,
            is_official: self.phase2.is_official,
            final_version: self
                .phase3
                .version_number
                .clone()
                .or_else(|| self.phase2.version_number.clone()),
        }
    }
}

/// Input supplied when resuming from a pause.
///
/// Ignored at the first pause. At the second pause an official run must
/// carry a committee and comments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeInput {
    pub is_official: bool,
    pub committee: Option<String>,
    pub comments: Option<String>,
}

impl ResumeInput {
    /// Continue without marking the run official.
    pub fn unofficial() -> Self {
        Self::default()
    }

    /// Mark the run official.
    pub fn official(committee: impl Into<String>, comments: impl Into<String>) -> Self {
        Self { is_official: true, committee: Some(committee.into()), comments: Some(comments.into()) }
    }

    /// Problems that block Phase 3.
    pub(crate) fn official_errors(&self) -> Vec<String> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut errors = Vec::new();
        if blank(&self.committee) {
            errors.push("Committee is required for an official version".to_string());
        }
        if blank(&self.comments) {
            errors.push("Comments are required for an official version".to_string());
        }
        errors
    }
}
