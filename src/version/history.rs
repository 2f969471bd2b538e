//! Version-history records written for official versions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ParsedVersion;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// One row of a document's version-history page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistoryEntry {
    pub version_number: String,
    /// Committee display name
    pub committee: String,
    /// Display timestamp of the official version
    pub timestamp: String,
    pub comments: String,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Check that a history entry is complete and its identifier parses.
pub fn validate(entry: &VersionHistoryEntry) -> ValidationReport {
    let mut errors = Vec::new();

    if entry.version_number.trim().is_empty() {
        errors.push("Version number is required".to_string());
    } else if let Err(e) = entry.version_number.parse::<ParsedVersion>() {
        errors.push(format!("Version number is malformed: {}", e));
    }
    if entry.committee.trim().is_empty() {
        errors.push("Committee is required".to_string());
    }
    if entry.timestamp.trim().is_empty() {
        errors.push("Timestamp is required".to_string());
    }
    if entry.comments.trim().is_empty() {
        errors.push("Comments are required".to_string());
    }

    ValidationReport { valid: errors.is_empty(), errors }
}

/// Strip markup tags, collapse runs of 3+ newlines to 2 and trim.
pub fn sanitize_comments(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    let stripped = MARKUP_TAG.replace_all(&normalized, "");
    let collapsed = EXCESS_NEWLINES.replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}
