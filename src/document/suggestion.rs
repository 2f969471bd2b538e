//! Tracked-change detection over WordprocessingML.

use std::cmp::Reverse;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Self-closing markers (e.g. inserted paragraph marks) carry no runs and are skipped.
static INSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:ins((?:\s[^>]*[^/])?)>(.*?)</w:ins>").expect("valid regex")
});
static DELETION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:del((?:\s[^>]*[^/])?)>(.*?)</w:del>").expect("valid regex")
});
static RUN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<w:(?:t|delText)(?:\s[^>]*)?>([^<]*)</w:(?:t|delText)>").expect("valid regex")
});
static ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"w:(id|author|date)="([^"]*)""#).expect("valid regex"));

/// Errors from suggestion detection.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// The text is not a WordprocessingML document part.
    #[error("Document XML has no <w:body> element")]
    NotWordprocessingMl,
}

/// Kind of tracked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Insertion,
    Deletion,
}

/// A tracked change found in the document XML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub id: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    /// Concatenated run text, still XML-escaped
    pub text: String,
    /// Raw markup between the element's start and end tags
    pub body: String,
    /// Byte range of the whole element in the source XML
    pub span: Range<usize>,
}

impl Suggestion {
    pub fn is_insertion(&self) -> bool {
        self.kind == SuggestionKind::Insertion
    }

    pub fn is_deletion(&self) -> bool {
        self.kind == SuggestionKind::Deletion
    }
}

/// Extracts suggestions from a document part.
pub trait SuggestionDetector: Send + Sync {
    /// Return all suggestions, ordered by position.
    fn extract_suggestions(&self, xml: &str) -> Result<Vec<Suggestion>, DetectionError>;
}

/// Detects `<w:ins>` and `<w:del>` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackedChangeDetector;

impl TrackedChangeDetector {
    fn collect(regex: &Regex, kind: SuggestionKind, xml: &str, out: &mut Vec<Suggestion>) {
        for caps in regex.captures_iter(xml) {
            out.push(suggestion_from(kind, &caps));
        }
    }
}

fn suggestion_from(kind: SuggestionKind, caps: &Captures<'_>) -> Suggestion {
    let whole = caps.get(0).map_or(0..0, |m| m.range());
    let attributes = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());

    let mut suggestion = Suggestion {
        kind,
        id: None,
        author: None,
        date: None,
        text: String::new(),
        body: body.to_string(),
        span: whole,
    };

    for attr in ATTRIBUTE.captures_iter(attributes) {
        let value = Some(attr[2].to_string());
        match &attr[1] {
            "id" => suggestion.id = value,
            "author" => suggestion.author = value,
            "date" => suggestion.date = value,
            _ => {}
        }
    }

    suggestion.text = RUN_TEXT.captures_iter(body).map(|c| c[1].to_string()).collect();
    suggestion
}

/// Fold changes that sit inside an earlier element into it, so the returned
/// spans never overlap. Input must be sorted by start, longest span first.
///
/// Word nests a `<w:del>` inside a `<w:ins>` when someone deletes text that
/// was itself still a pending insertion. That text does not survive either
/// way, so the outer suggestion becomes a deletion.
fn fold_nested(sorted: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut folded: Vec<Suggestion> = Vec::with_capacity(sorted.len());
    for suggestion in sorted {
        if let Some(outer) = folded.last_mut() {
            if suggestion.span.end <= outer.span.end {
                if suggestion.is_deletion() {
                    outer.kind = SuggestionKind::Deletion;
                }
                continue;
            }
        }
        folded.push(suggestion);
    }
    folded
}

impl SuggestionDetector for TrackedChangeDetector {
    fn extract_suggestions(&self, xml: &str) -> Result<Vec<Suggestion>, DetectionError> {
        if !xml.contains("<w:body") {
            return Err(DetectionError::NotWordprocessingMl);
        }

        let mut suggestions = Vec::new();
        Self::collect(&INSERTION, SuggestionKind::Insertion, xml, &mut suggestions);
        Self::collect(&DELETION, SuggestionKind::Deletion, xml, &mut suggestions);
        suggestions.sort_by_key(|s| (s.span.start, Reverse(s.span.end)));
        Ok(fold_nested(suggestions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = concat!(
        r#"<w:document><w:body><w:p>"#,
        r#"<w:r><w:t>Keep </w:t></w:r>"#,
        r#"<w:del w:id="2" w:author="Ana" w:date="2025-10-01T10:00:00Z"><w:r><w:delText>old</w:delText></w:r></w:del>"#,
        r#"<w:ins w:id="3" w:author="Ben"><w:r><w:t xml:space="preserve">new </w:t></w:r><w:r><w:t>text</w:t></w:r></w:ins>"#,
        r#"</w:p><w:p><w:pPr><w:rPr><w:ins w:id="4" w:author="Ben"/></w:rPr></w:pPr></w:p>"#,
        r#"</w:body></w:document>"#
    );

    #[test]
    fn test_detects_insertions_and_deletions_in_order() {
        let found = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].kind, SuggestionKind::Deletion);
        assert_eq!(found[0].id.as_deref(), Some("2"));
        assert_eq!(found[0].author.as_deref(), Some("Ana"));
        assert_eq!(found[0].date.as_deref(), Some("2025-10-01T10:00:00Z"));
        assert_eq!(found[0].text, "old");

        assert_eq!(found[1].kind, SuggestionKind::Insertion);
        assert_eq!(found[1].text, "new text");
        assert_eq!(found[1].date, None);
    }

    #[test]
    fn test_span_covers_element() {
        let found = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        let span = found[1].span.clone();
        assert!(XML[span.clone()].starts_with("<w:ins "));
        assert!(XML[span].ends_with("</w:ins>"));
    }

    #[test]
    fn test_body_keeps_run_markup() {
        let found = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        assert_eq!(found[0].body, "<w:r><w:delText>old</w:delText></w:r>");
        assert!(found[1].body.starts_with(r#"<w:r><w:t xml:space="preserve">new </w:t></w:r>"#));
    }

    #[test]
    fn test_deleted_insertion_is_one_deletion() {
        let xml = concat!(
            r#"<w:document><w:body><w:p><w:r><w:t>Keep</w:t></w:r>"#,
            r#"<w:ins w:id="1" w:author="Ana"><w:del w:id="2" w:author="Ben">"#,
            r#"<w:r><w:delText>gone</w:delText></w:r></w:del></w:ins>"#,
            r#"<w:del w:id="3"><w:r><w:delText>old</w:delText></w:r></w:del>"#,
            r#"</w:p></w:body></w:document>"#
        );
        let found = TrackedChangeDetector.extract_suggestions(xml).unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, SuggestionKind::Deletion);
        assert_eq!(found[0].id.as_deref(), Some("1"));
        assert_eq!(found[0].author.as_deref(), Some("Ana"));
        assert_eq!(found[0].text, "gone");
        assert!(xml[found[0].span.clone()].starts_with("<w:ins "));
        assert!(xml[found[0].span.clone()].ends_with("</w:del></w:ins>"));
        assert!(found[0].span.end <= found[1].span.start);
        assert_eq!(found[1].id.as_deref(), Some("3"));
    }

    #[test]
    fn test_no_suggestions() {
        let xml = "<w:document><w:body><w:p><w:r><w:t>Plain</w:t></w:r></w:p></w:body></w:document>";
        assert!(TrackedChangeDetector.extract_suggestions(xml).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_non_document_xml() {
        assert!(matches!(
            TrackedChangeDetector.extract_suggestions("<root/>"),
            Err(DetectionError::NotWordprocessingMl)
        ));
    }
}
