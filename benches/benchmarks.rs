//! Performance benchmarks for MIGOP.
//!
//! This module contains benchmarks for:
//! - Suggestion detection over large document parts
//! - Rewriting suggestions as visible markup
//! - DOCX rebuild
//! - Version identifier parsing
//!
//! Run with: `cargo bench`

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use migop::document::{
    build_docx, DocxProcessor, SuggestionDetector, TrackedChangeDetector, VisibleMarkupTransformer,
    XmlTransformer, ZipDocxProcessor,
};
use migop::version::{ParsedVersion, VersionIdentifier, VersionType};

// ============================================================================
// Mock Data Fixtures
// ============================================================================

mod fixtures {
    /// Document part with `paragraphs` paragraphs, every other one carrying
    /// an insertion and a deletion.
    pub fn generate_document_xml(paragraphs: usize) -> String {
        let mut xml = String::from(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
        );

        for i in 0..paragraphs {
            xml.push_str("<w:p><w:r><w:t xml:space=\"preserve\">Paragraph text that stays </w:t></w:r>");
            if i % 2 == 0 {
                xml.push_str(&format!(
                    r#"<w:ins w:id="{}" w:author="Reviewer" w:date="2025-10-04T09:15:30Z"><w:r><w:t>added {}</w:t></w:r></w:ins>"#,
                    i * 2,
                    i
                ));
                xml.push_str(&format!(
                    r#"<w:del w:id="{}" w:author="Reviewer" w:date="2025-10-04T09:15:30Z"><w:r><w:delText>removed {}</w:delText></w:r></w:del>"#,
                    i * 2 + 1,
                    i
                ));
            }
            xml.push_str("</w:p>");
        }

        xml.push_str("</w:body></w:document>");
        xml
    }
}

// ============================================================================
// Document Benchmarks
// ============================================================================

fn bench_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection");

    for paragraphs in [10, 100, 1000] {
        let xml = fixtures::generate_document_xml(paragraphs);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &xml, |b, xml| {
            b.iter(|| TrackedChangeDetector.extract_suggestions(black_box(xml)).unwrap());
        });
    }

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let transformer = VisibleMarkupTransformer::default();

    for paragraphs in [10, 100, 1000] {
        let xml = fixtures::generate_document_xml(paragraphs);
        let suggestions = TrackedChangeDetector.extract_suggestions(&xml).unwrap();
        group.throughput(Throughput::Elements(suggestions.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(paragraphs),
            &(xml, suggestions),
            |b, (xml, suggestions)| {
                b.iter(|| transformer.transform_xml(black_box(xml), black_box(suggestions)).unwrap());
            },
        );
    }

    group.finish();
}

fn bench_repack(c: &mut Criterion) {
    let xml = fixtures::generate_document_xml(1000);
    let package = ZipDocxProcessor.unpack(&build_docx(&xml).unwrap()).unwrap();

    c.bench_function("repack_1000_paragraphs", |b| {
        b.iter(|| ZipDocxProcessor.repack(black_box(&package), black_box(&xml)).unwrap());
    });
}

// ============================================================================
// Version Benchmarks
// ============================================================================

fn bench_versions(c: &mut Criterion) {
    let at = NaiveDate::from_ymd_opt(2025, 10, 4).unwrap().and_hms_opt(9, 15, 30).unwrap();

    c.bench_function("version_generate", |b| {
        b.iter(|| VersionIdentifier::generate(black_box(42), VersionType::After, at).unwrap());
    });

    c.bench_function("version_parse_and_format", |b| {
        b.iter(|| {
            let parsed: ParsedVersion = black_box("42:A:25:10:04:09:15:30").parse().unwrap();
            parsed.format_for_display()
        });
    });
}

criterion_group!(benches, bench_detection, bench_transform, bench_repack, bench_versions);
criterion_main!(benches);
