//! Rewrites tracked changes as visible, formatted runs.
//!
//! Each run inside a tracked element is kept as it was, with its
//! `<w:rPr>` merged with the change colour and underline or strike.
//! Tabs, breaks and other run children survive; only the `w:ins`/`w:del`
//! wrappers go away.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::suggestion::{Suggestion, SuggestionKind};

static RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(<w:r(?:\s[^>]*[^/])?>)(.*?)</w:r>").expect("valid regex")
});
static RUN_PROPERTIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:rPr>(.*?)</w:rPr>").expect("valid regex"));
// Formatting-change records and empty property elements.
static DROPPED_PROPERTIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<w:rPrChange\b.*?</w:rPrChange>|<w:rPr\s*/>").expect("valid regex")
});
static OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<w:([A-Za-z]+)[^>]*>").expect("valid regex"));

// CT_RPr child order. Word rejects run properties written out of sequence.
const PROPERTY_ORDER: &[&str] = &[
    "rStyle", "rFonts", "b", "bCs", "i", "iCs", "caps", "smallCaps", "strike", "dstrike",
    "outline", "shadow", "emboss", "imprint", "noProof", "snapToGrid", "vanish", "webHidden",
    "color", "spacing", "w", "kern", "position", "sz", "szCs", "highlight", "u", "effect", "bdr",
    "shd", "fitText", "vertAlign", "rtl", "cs", "em", "lang", "eastAsianLayout", "specVanish",
    "oMath",
];

/// Errors from splicing rewrites into the document XML.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A suggestion's span falls outside the document.
    #[error("Suggestion at {start}..{end} is outside the document ({len} bytes)")]
    OutOfRange { start: usize, end: usize, len: usize },

    /// Two suggestions claim the same bytes.
    #[error("Suggestions overlap at byte {0}")]
    Overlap(usize),

    /// Rewrite count does not match suggestion count.
    #[error("Expected {expected} rewrites, got {actual}")]
    Mismatch { expected: usize, actual: usize },
}

/// Turns suggestions into replacement markup.
pub trait XmlTransformer: Send + Sync {
    /// Replacement markup for one suggestion's element.
    fn rewrite(&self, suggestion: &Suggestion) -> String;

    /// Rewrite every suggestion in one pass.
    fn transform_xml(&self, xml: &str, suggestions: &[Suggestion]) -> Result<String, TransformError> {
        let rewrites: Vec<String> = suggestions.iter().map(|s| self.rewrite(s)).collect();
        apply_rewrites(xml, suggestions, &rewrites)
    }
}

/// Insertions become coloured + underlined text, deletions coloured + struck through.
#[derive(Debug, Clone)]
pub struct VisibleMarkupTransformer {
    /// Hex colour for inserted text
    pub insertion_color: String,
    /// Hex colour for deleted text
    pub deletion_color: String,
}

impl Default for VisibleMarkupTransformer {
    fn default() -> Self {
        Self { insertion_color: "00B050".to_string(), deletion_color: "FF0000".to_string() }
    }
}

impl VisibleMarkupTransformer {
    fn markup(&self, kind: SuggestionKind) -> [(&'static str, String); 2] {
        match kind {
            SuggestionKind::Insertion => [
                ("color", format!(r#"<w:color w:val="{}"/>"#, self.insertion_color)),
                ("u", r#"<w:u w:val="single"/>"#.to_string()),
            ],
            SuggestionKind::Deletion => [
                ("strike", "<w:strike/>".to_string()),
                ("color", format!(r#"<w:color w:val="{}"/>"#, self.deletion_color)),
            ],
        }
    }

    fn rewrite_run(&self, kind: SuggestionKind, open: &str, content: &str) -> String {
        let content = DROPPED_PROPERTIES.replace_all(content, "");
        let (existing, rest) = match RUN_PROPERTIES.captures(&content) {
            Some(caps) => {
                let whole = caps.get(0).map_or(0..0, |m| m.range());
                let inner = caps.get(1).map_or("", |m| m.as_str()).to_string();
                (inner, format!("{}{}", &content[..whole.start], &content[whole.end..]))
            }
            None => (String::new(), content.to_string()),
        };

        let mut properties: Vec<(&str, String)> = property_children(&existing)
            .into_iter()
            .filter(|(name, _)| !matches!(*name, "color" | "u" | "strike" | "dstrike"))
            .map(|(name, element)| (name, element.to_string()))
            .collect();
        properties.extend(self.markup(kind));
        properties.sort_by_key(|(name, _)| property_rank(name));

        let properties: String = properties.into_iter().map(|(_, element)| element).collect();
        let rest = rest
            .replace("<w:delText", "<w:t")
            .replace("</w:delText>", "</w:t>")
            .replace("<w:delInstrText", "<w:instrText")
            .replace("</w:delInstrText>", "</w:instrText>");

        format!("{open}<w:rPr>{properties}</w:rPr>{rest}</w:r>")
    }
}

impl XmlTransformer for VisibleMarkupTransformer {
    fn rewrite(&self, suggestion: &Suggestion) -> String {
        RUN.captures_iter(&suggestion.body)
            .map(|caps| {
                let open = caps.get(1).map_or("<w:r>", |m| m.as_str());
                let content = caps.get(2).map_or("", |m| m.as_str());
                self.rewrite_run(suggestion.kind, open, content)
            })
            .collect()
    }
}

/// Split the children of a `<w:rPr>` into `(local name, element)` pairs.
fn property_children(properties: &str) -> Vec<(&str, &str)> {
    let mut children = Vec::new();
    let mut offset = 0;
    while let Some(caps) = OPEN_TAG.captures_at(properties, offset) {
        let (Some(tag), Some(name)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let end = if tag.as_str().ends_with("/>") {
            tag.end()
        } else {
            let close = format!("</w:{}>", name.as_str());
            properties[tag.end()..]
                .find(&close)
                .map_or(properties.len(), |i| tag.end() + i + close.len())
        };
        children.push((name.as_str(), &properties[tag.start()..end]));
        offset = end;
    }
    children
}

fn property_rank(name: &str) -> usize {
    PROPERTY_ORDER.iter().position(|known| *known == name).unwrap_or(PROPERTY_ORDER.len())
}

/// Replace each suggestion's span with its rewrite.
///
/// `rewrites[i]` belongs to `suggestions[i]`; spans may arrive in any order
/// but must be disjoint and inside `xml`.
pub fn apply_rewrites(
    xml: &str,
    suggestions: &[Suggestion],
    rewrites: &[String],
) -> Result<String, TransformError> {
    if suggestions.len() != rewrites.len() {
        return Err(TransformError::Mismatch {
            expected: suggestions.len(),
            actual: rewrites.len(),
        });
    }

    let mut order: Vec<usize> = (0..suggestions.len()).collect();
    order.sort_by_key(|&i| suggestions[i].span.start);

    let mut out = String::with_capacity(xml.len());
    let mut cursor = 0;
    for i in order {
        let span = &suggestions[i].span;
        if span.start > span.end
            || span.end > xml.len()
            || !xml.is_char_boundary(span.start)
            || !xml.is_char_boundary(span.end)
        {
            return Err(TransformError::OutOfRange {
                start: span.start,
                end: span.end,
                len: xml.len(),
            });
        }
        if span.start < cursor {
            return Err(TransformError::Overlap(span.start));
        }

        out.push_str(&xml[cursor..span.start]);
        out.push_str(&rewrites[i]);
        cursor = span.end;
    }
    out.push_str(&xml[cursor..]);

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{SuggestionDetector, TrackedChangeDetector};

    const XML: &str = concat!(
        r#"<w:document><w:body><w:p><w:r><w:t>A </w:t></w:r>"#,
        r#"<w:ins w:id="1"><w:r><w:t>added</w:t></w:r></w:ins>"#,
        r#"<w:del w:id="2"><w:r><w:delText>gone</w:delText></w:r></w:del>"#,
        r#"</w:p></w:body></w:document>"#
    );

    #[test]
    fn test_transform_makes_changes_visible() {
        let suggestions = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        let out = VisibleMarkupTransformer::default().transform_xml(XML, &suggestions).unwrap();

        assert!(!out.contains("<w:ins"));
        assert!(!out.contains("<w:del "));
        assert!(out.contains(concat!(
            r#"<w:r><w:rPr><w:color w:val="00B050"/><w:u w:val="single"/></w:rPr>"#,
            r#"<w:t>added</w:t></w:r>"#
        )));
        assert!(out.contains(concat!(
            r#"<w:r><w:rPr><w:strike/><w:color w:val="FF0000"/></w:rPr>"#,
            r#"<w:t>gone</w:t></w:r>"#
        )));
        assert!(out.starts_with("<w:document><w:body><w:p><w:r><w:t>A </w:t></w:r><w:r>"));
        assert!(out.ends_with("</w:p></w:body></w:document>"));

        // Nothing left to detect.
        assert!(TrackedChangeDetector.extract_suggestions(&out).unwrap().is_empty());
    }

    #[test]
    fn test_run_formatting_survives() {
        let xml = concat!(
            r#"<w:document><w:body><w:p>"#,
            r#"<w:ins w:id="1"><w:r w:rsidR="00A1"><w:rPr><w:b/><w:sz w:val="28"/><w:color w:val="333333"/></w:rPr>"#,
            r#"<w:tab/><w:t>Bold</w:t><w:br/></w:r><w:r><w:t xml:space="preserve"> plain</w:t></w:r></w:ins>"#,
            r#"</w:p></w:body></w:document>"#
        );
        let suggestions = TrackedChangeDetector.extract_suggestions(xml).unwrap();
        let out = VisibleMarkupTransformer::default().transform_xml(xml, &suggestions).unwrap();

        assert_eq!(
            out,
            concat!(
                r#"<w:document><w:body><w:p>"#,
                r#"<w:r w:rsidR="00A1"><w:rPr><w:b/><w:color w:val="00B050"/><w:sz w:val="28"/><w:u w:val="single"/></w:rPr>"#,
                r#"<w:tab/><w:t>Bold</w:t><w:br/></w:r>"#,
                r#"<w:r><w:rPr><w:color w:val="00B050"/><w:u w:val="single"/></w:rPr><w:t xml:space="preserve"> plain</w:t></w:r>"#,
                r#"</w:p></w:body></w:document>"#
            )
        );
    }

    #[test]
    fn test_deleted_runs_become_visible_text() {
        let suggestion = Suggestion {
            kind: SuggestionKind::Deletion,
            id: Some("7".to_string()),
            author: None,
            date: None,
            text: "x".to_string(),
            body: concat!(
                r#"<w:r><w:rPr><w:i/><w:rPrChange w:id="8"><w:rPr><w:b/></w:rPr></w:rPrChange></w:rPr>"#,
                r#"<w:delInstrText>PAGE</w:delInstrText><w:delText xml:space="preserve">x </w:delText></w:r>"#
            )
            .to_string(),
            span: 0..0,
        };
        let out = VisibleMarkupTransformer::default().rewrite(&suggestion);

        assert_eq!(
            out,
            concat!(
                r#"<w:r><w:rPr><w:i/><w:strike/><w:color w:val="FF0000"/></w:rPr>"#,
                r#"<w:instrText>PAGE</w:instrText><w:t xml:space="preserve">x </w:t></w:r>"#
            )
        );
    }

    #[test]
    fn test_deleted_insertion_transforms() {
        let xml = concat!(
            r#"<w:document><w:body><w:p><w:r><w:t>Keep</w:t></w:r>"#,
            r#"<w:ins w:id="1"><w:del w:id="2"><w:r><w:delText>gone</w:delText></w:r></w:del></w:ins>"#,
            r#"</w:p></w:body></w:document>"#
        );
        let suggestions = TrackedChangeDetector.extract_suggestions(xml).unwrap();
        let out = VisibleMarkupTransformer::default().transform_xml(xml, &suggestions).unwrap();

        assert_eq!(
            out,
            concat!(
                r#"<w:document><w:body><w:p><w:r><w:t>Keep</w:t></w:r>"#,
                r#"<w:r><w:rPr><w:strike/><w:color w:val="FF0000"/></w:rPr><w:t>gone</w:t></w:r>"#,
                r#"</w:p></w:body></w:document>"#
            )
        );
        assert!(TrackedChangeDetector.extract_suggestions(&out).unwrap().is_empty());
    }

    #[test]
    fn test_no_suggestions_is_identity() {
        let out = VisibleMarkupTransformer::default().transform_xml(XML, &[]).unwrap();
        assert_eq!(out, XML);
    }

    #[test]
    fn test_overlapping_spans_rejected() {
        let mut suggestions = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        suggestions[1].span.start = suggestions[0].span.start + 1;
        let err = VisibleMarkupTransformer::default().transform_xml(XML, &suggestions).unwrap_err();
        assert!(matches!(err, TransformError::Overlap(_)));
    }

    #[test]
    fn test_out_of_range_span_rejected() {
        let mut suggestions = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        suggestions[0].span = 0..XML.len() + 10;
        let err = VisibleMarkupTransformer::default().transform_xml(XML, &suggestions).unwrap_err();
        assert!(matches!(err, TransformError::OutOfRange { .. }));
    }

    #[test]
    fn test_rewrite_count_mismatch() {
        let suggestions = TrackedChangeDetector.extract_suggestions(XML).unwrap();
        let err = apply_rewrites(XML, &suggestions, &[]).unwrap_err();
        assert!(matches!(err, TransformError::Mismatch { expected: 2, actual: 0 }));
    }
}
