//! Document Gateway: the remote document-editing service boundary.
//!
//! The workflow talks to the live document only through [`DocumentGateway`].
//! Response shapes mirror the service's JSON contract (camelCase fields).

mod local;

pub use local::{FileGateway, LocalState};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::VersionHistoryEntry;

/// Transport-level gateway failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Service could not be reached.
    #[error("Gateway unreachable: {0}")]
    Unreachable(String),

    /// IO error in a local gateway.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Metadata returned with an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub size: u64,
    pub doc_id: String,
    pub doc_name: String,
    pub exported_at: String,
}

/// Response of `export_document`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub success: bool,
    /// Base64-encoded DOCX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExportMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn ok(data: String, metadata: ExportMetadata) -> Self {
        Self { success: true, data: Some(data), metadata: Some(metadata), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Default::default() }
    }
}

/// Details of a confirmed replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementDetails {
    pub replaced_at: String,
    pub doc_id: String,
}

/// Response of `replace_document`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_details: Option<ReplacementDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReplaceResponse {
    pub fn ok(details: ReplacementDetails) -> Self {
        Self { success: true, replacement_details: Some(details), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Default::default() }
    }
}

/// Response of `write_version_history`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WriteResponse {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// Remote document-editing service.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Export the current document as base64 DOCX.
    async fn export_document(&self) -> Result<ExportResponse, GatewayError>;

    /// Replace the live document with base64 DOCX content.
    async fn replace_document(&self, data: String) -> Result<ReplaceResponse, GatewayError>;

    /// Read the version counter, incrementing it first when asked.
    ///
    /// Returns the raw stored value; callers normalise it with
    /// [`normalize_counter`].
    async fn version_counter(&self, increment: bool) -> serde_json::Value;

    /// Append an entry to the document's version-history page.
    async fn write_version_history(
        &self,
        entry: VersionHistoryEntry,
    ) -> Result<WriteResponse, GatewayError>;
}

/// Interpret a raw counter value, defaulting to 1 on any anomaly.
pub fn normalize_counter(value: &serde_json::Value) -> u64 {
    let parsed = match value {
        serde_json::Value::Number(n) => {
            n.as_u64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64))
        }
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    match parsed {
        Some(n) if n > 0 => n,
        _ => {
            tracing::warn!(raw = %value, "version counter unavailable, defaulting to 1");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_counter() {
        assert_eq!(normalize_counter(&json!(7)), 7);
        assert_eq!(normalize_counter(&json!("12")), 12);
        assert_eq!(normalize_counter(&json!(3.0)), 3);
        assert_eq!(normalize_counter(&json!(null)), 1);
        assert_eq!(normalize_counter(&json!("abc")), 1);
        assert_eq!(normalize_counter(&json!(0)), 1);
        assert_eq!(normalize_counter(&json!(-4)), 1);
        assert_eq!(normalize_counter(&json!(2.5)), 1);
    }

    #[test]
    fn test_export_response_wire_format() {
        let raw = r#"{
            "success": true,
            "data": "UEsDBA==",
            "metadata": {"size": 4, "docId": "abc", "docName": "Charter", "exportedAt": "2025-10-04T09:15:30Z"}
        }"#;
        let response: ExportResponse = serde_json::from_str(raw).unwrap();
        assert!(response.success);
        assert_eq!(response.metadata.unwrap().doc_name, "Charter");
        assert_eq!(response.error, None);
    }

    #[test]
    fn test_failed_response_wire_format() {
        let response: ReplaceResponse =
            serde_json::from_str(r#"{"success": false, "error": "quota exceeded"}"#).unwrap();
        assert_eq!(response, ReplaceResponse::failed("quota exceeded"));

        let json = serde_json::to_string(&ReplaceResponse::ok(ReplacementDetails {
            replaced_at: "now".into(),
            doc_id: "abc".into(),
        }))
        .unwrap();
        assert!(json.contains("replacementDetails"));
        assert!(json.contains("replacedAt"));
    }
}
