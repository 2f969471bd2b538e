//! Document-processing collaborators consumed by the workflow.
//!
//! - [`SuggestionDetector`] finds tracked changes in the document XML
//! - [`XmlTransformer`] rewrites them as visible markup
//! - [`DocxProcessor`] unpacks and rebuilds the DOCX container

mod docx;
mod suggestion;
mod transform;

pub use docx::{
    build_docx, decode_blob, encode_blob, DocxEntry, DocxError, DocxPackage, DocxProcessor,
    ZipDocxProcessor, DOCUMENT_PART,
};
pub use suggestion::{
    DetectionError, Suggestion, SuggestionDetector, SuggestionKind, TrackedChangeDetector,
};
pub use transform::{apply_rewrites, TransformError, VisibleMarkupTransformer, XmlTransformer};
