//! DOCX container handling and transport encoding.
//!
//! The container is treated as an opaque zip archive: every entry is carried
//! through untouched except the main document part.

use std::io::{Cursor, Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Path of the main document part inside a DOCX container.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Errors from unpacking, repacking or encoding DOCX data.
#[derive(Debug, Error)]
pub enum DocxError {
    /// Archive could not be read or written.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error while streaming entries.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Required part is absent from the container.
    #[error("DOCX is missing required part: {0}")]
    MissingPart(String),

    /// The document part is not valid UTF-8.
    #[error("Document part is not valid UTF-8")]
    InvalidUtf8,

    /// Transport encoding could not be decoded.
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One file inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocxEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Unpacked container, kept so the document can be rebuilt later.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocxPackage {
    entries: Vec<DocxEntry>,
}

impl DocxPackage {
    pub fn new(entries: Vec<DocxEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[DocxEntry] {
        &self.entries
    }

    /// Text of the main document part.
    pub fn document_xml(&self) -> Result<String, DocxError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.name == DOCUMENT_PART)
            .ok_or_else(|| DocxError::MissingPart(DOCUMENT_PART.to_string()))?;
        String::from_utf8(entry.data.clone()).map_err(|_| DocxError::InvalidUtf8)
    }

    /// Uncompressed size of all entries.
    pub fn total_size(&self) -> usize {
        self.entries.iter().map(|e| e.data.len()).sum()
    }
}

/// Unpacks and rebuilds DOCX containers.
pub trait DocxProcessor: Send + Sync {
    /// Read every entry of the container.
    fn unpack(&self, docx: &[u8]) -> Result<DocxPackage, DocxError>;

    /// Rebuild the container with a new main document part.
    fn repack(&self, package: &DocxPackage, document_xml: &str) -> Result<Vec<u8>, DocxError>;
}

/// [`DocxProcessor`] backed by the `zip` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipDocxProcessor;

impl DocxProcessor for ZipDocxProcessor {
    fn unpack(&self, docx: &[u8]) -> Result<DocxPackage, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(docx))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push(DocxEntry { name: file.name().to_string(), data });
        }

        let package = DocxPackage::new(entries);
        if !package.entries.iter().any(|e| e.name == DOCUMENT_PART) {
            return Err(DocxError::MissingPart(DOCUMENT_PART.to_string()));
        }
        Ok(package)
    }

    fn repack(&self, package: &DocxPackage, document_xml: &str) -> Result<Vec<u8>, DocxError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for entry in package.entries() {
            zip.start_file(entry.name.as_str(), options)?;
            if entry.name == DOCUMENT_PART {
                zip.write_all(document_xml.as_bytes())?;
            } else {
                zip.write_all(&entry.data)?;
            }
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Encode a blob for transport.
pub fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a transported blob.
pub fn decode_blob(data: &str) -> Result<Vec<u8>, DocxError> {
    Ok(STANDARD.decode(data.trim())?)
}

/// Build a minimal container around a document part.
pub fn build_docx(document_xml: &str) -> Result<Vec<u8>, DocxError> {
    let package = DocxPackage::new(vec![
        DocxEntry {
            name: "[Content_Types].xml".to_string(),
            data: br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#.to_vec(),
        },
        DocxEntry { name: DOCUMENT_PART.to_string(), data: Vec::new() },
    ]);
    ZipDocxProcessor.repack(&package, document_xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = "<w:document><w:body><w:p/></w:body></w:document>";

    #[test]
    fn test_unpack_exposes_document_part() {
        let docx = build_docx(XML).unwrap();
        let package = ZipDocxProcessor.unpack(&docx).unwrap();

        assert_eq!(package.entries().len(), 2);
        assert_eq!(package.document_xml().unwrap(), XML);
        assert!(package.total_size() > XML.len());
    }

    #[test]
    fn test_repack_replaces_only_document_part() {
        let docx = build_docx(XML).unwrap();
        let package = ZipDocxProcessor.unpack(&docx).unwrap();

        let rebuilt = ZipDocxProcessor.repack(&package, "<w:document><w:body/></w:document>").unwrap();
        let again = ZipDocxProcessor.unpack(&rebuilt).unwrap();

        assert_eq!(again.document_xml().unwrap(), "<w:document><w:body/></w:document>");
        assert_eq!(again.entries()[0], package.entries()[0]);
    }

    #[test]
    fn test_missing_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("other.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        assert!(matches!(ZipDocxProcessor.unpack(&bytes), Err(DocxError::MissingPart(_))));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(matches!(ZipDocxProcessor.unpack(b"plain text"), Err(DocxError::Zip(_))));
    }

    #[test]
    fn test_blob_encoding() {
        let encoded = encode_blob(b"docx bytes");
        assert_eq!(decode_blob(&encoded).unwrap(), b"docx bytes");
        assert!(matches!(decode_blob("%%%"), Err(DocxError::Base64(_))));
    }
}
