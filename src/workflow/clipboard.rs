//! Best-effort clipboard for version identifiers at pause points.

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),
}

/// Destination for identifiers the user pastes into the host editor.
pub trait Clipboard: Send + Sync {
    fn copy(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Logs the identifier; the host editor owns the real clipboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogClipboard;

impl Clipboard for LogClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        tracing::info!(version = text, "version number ready to paste");
        Ok(())
    }
}

/// Keeps everything copied, newest last.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    entries: Mutex<Vec<String>>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent copy.
    pub fn last(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        self.entries.lock().push(text.to_string());
        Ok(())
    }
}
