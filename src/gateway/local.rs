//! File-backed gateway for running the workflow against a DOCX on disk.
//!
//! The version counter and version-history entries persist in a JSON sidecar
//! next to the document (`<stem>.migop.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::{
    DocumentGateway, ExportMetadata, ExportResponse, GatewayError, ReplaceResponse,
    ReplacementDetails, WriteResponse,
};
use crate::document::{decode_blob, encode_blob};
use crate::version::VersionHistoryEntry;

/// Persistent per-document state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalState {
    pub version_counter: u64,
    pub history: Vec<VersionHistoryEntry>,
}

/// [`DocumentGateway`] over a local DOCX file.
#[derive(Debug)]
pub struct FileGateway {
    source: PathBuf,
    output: PathBuf,
    sidecar: PathBuf,
    state_lock: Mutex<()>,
}

impl FileGateway {
    /// Gateway that replaces the document in place.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let output = source.clone();
        Self::with_output(source, output)
    }

    /// Gateway that writes the replacement to `output`.
    pub fn with_output(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let sidecar = Self::sidecar_path(&source);
        Self { source, output: output.into(), sidecar, state_lock: Mutex::new(()) }
    }

    /// Sidecar path for a document.
    pub fn sidecar_path(document: &Path) -> PathBuf {
        let stem = document.file_stem().and_then(|s| s.to_str()).unwrap_or("document");
        document.with_file_name(format!("{}.migop.json", stem))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Recorded version-history entries.
    pub async fn history(&self) -> Result<Vec<VersionHistoryEntry>, GatewayError> {
        let _guard = self.state_lock.lock().await;
        Ok(self.load_state().await?.history)
    }

    async fn load_state(&self) -> Result<LocalState, GatewayError> {
        match tokio::fs::read_to_string(&self.sidecar).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LocalState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_state(&self, state: &LocalState) -> Result<(), GatewayError> {
        let content = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.sidecar, content).await?;
        Ok(())
    }

    fn doc_id(&self) -> String {
        self.source.display().to_string()
    }
}

fn now_rfc3339() -> String {
    chrono::Local::now().to_rfc3339()
}

#[async_trait]
impl DocumentGateway for FileGateway {
    async fn export_document(&self) -> Result<ExportResponse, GatewayError> {
        let bytes = match tokio::fs::read(&self.source).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ExportResponse::failed(format!(
                    "Document not found: {}",
                    self.source.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let doc_name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let metadata = ExportMetadata {
            size: bytes.len() as u64,
            doc_id: self.doc_id(),
            doc_name,
            exported_at: now_rfc3339(),
        };

        Ok(ExportResponse::ok(encode_blob(&bytes), metadata))
    }

    async fn replace_document(&self, data: String) -> Result<ReplaceResponse, GatewayError> {
        let bytes = match decode_blob(&data) {
            Ok(bytes) => bytes,
            Err(e) => return Ok(ReplaceResponse::failed(e.to_string())),
        };

        tokio::fs::write(&self.output, bytes).await?;
        Ok(ReplaceResponse::ok(ReplacementDetails {
            replaced_at: now_rfc3339(),
            doc_id: self.output.display().to_string(),
        }))
    }

    async fn version_counter(&self, increment: bool) -> serde_json::Value {
        let _guard = self.state_lock.lock().await;

        let mut state = match self.load_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(error = %e, "could not read version counter");
                return serde_json::Value::Null;
            }
        };

        if increment {
            state.version_counter += 1;
            if let Err(e) = self.save_state(&state).await {
                tracing::warn!(error = %e, "could not persist version counter");
                return serde_json::Value::Null;
            }
        }

        serde_json::Value::from(state.version_counter)
    }

    async fn write_version_history(
        &self,
        entry: VersionHistoryEntry,
    ) -> Result<WriteResponse, GatewayError> {
        let _guard = self.state_lock.lock().await;

        let mut state = self.load_state().await?;
        state.history.push(entry);
        self.save_state(&state).await?;
        Ok(WriteResponse::ok())
    }
}
