//! Page flattening: walk each page's annotations in z-order and commit them
//!
//! A failure in one annotation is logged and counted, never propagated.
//! Only document-level problems (load, encryption, page source, save) abort
//! a call, and then no output is produced.

use crate::canvas::{ContentCanvas, PageCanvas};
use crate::document;
use crate::options::FlattenOptions;
use crate::render::{render_annotation, RenderOutcome};
use doc_model::{PageAnnotationSet, RawAnnotation};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} could not be loaded: {message}")]
    PageSource { page: u32, message: String },
    #[error("failed to save PDF: {0}")]
    Save(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Tally of what happened to each annotation in a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlattenReport {
    pub pages_flattened: usize,
    pub drawn: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub ignored: usize,
    pub failed: usize,
    /// Annotated pages the document does not have
    pub missing_pages: usize,
}

impl FlattenReport {
    fn record(&mut self, outcome: RenderOutcome) {
        match outcome {
            RenderOutcome::Drawn => self.drawn += 1,
            RenderOutcome::Placeholder => self.placeholders += 1,
            RenderOutcome::Skipped => self.skipped += 1,
            RenderOutcome::Ignored => self.ignored += 1,
        }
    }

    pub fn merge(&mut self, other: &FlattenReport) {
        self.pages_flattened += other.pages_flattened;
        self.drawn += other.drawn;
        self.placeholders += other.placeholders;
        self.skipped += other.skipped;
        self.ignored += other.ignored;
        self.failed += other.failed;
        self.missing_pages += other.missing_pages;
    }
}

#[derive(Debug, Clone)]
pub struct FlattenedDocument {
    pub bytes: Vec<u8>,
    pub report: FlattenReport,
}

#[derive(Debug, Clone)]
pub struct FlattenedPages {
    /// Finalized bytes of every page that carried annotations
    pub pages: BTreeMap<u32, Vec<u8>>,
    pub report: FlattenReport,
}

/// Supplies the current bytes of a single page
pub trait PageSource {
    fn page_bytes(&self, page_number: u32) -> Result<Vec<u8>, FlattenError>;
}

impl PageSource for BTreeMap<u32, Vec<u8>> {
    fn page_bytes(&self, page_number: u32) -> Result<Vec<u8>, FlattenError> {
        self.get(&page_number).cloned().ok_or_else(|| FlattenError::PageSource {
            page: page_number,
            message: "page not available".to_owned(),
        })
    }
}

/// Render one page's annotations in order onto `canvas`
pub fn flatten_page(
    canvas: &mut dyn PageCanvas,
    page_number: u32,
    annotations: &[RawAnnotation],
    options: &FlattenOptions,
    report: &mut FlattenReport,
) {
    for (index, raw) in annotations.iter().enumerate() {
        let annotation = match raw.decode() {
            Ok(annotation) => annotation,
            Err(err) => {
                tracing::warn!(page = page_number, index, error = %err, "skipping malformed annotation");
                report.failed += 1;
                continue;
            }
        };

        match render_annotation(canvas, &annotation, options) {
            Ok(outcome) => report.record(outcome),
            Err(err) => {
                tracing::warn!(
                    page = page_number,
                    index,
                    kind = %annotation.kind(),
                    error = %err,
                    "failed to render annotation"
                );
                report.failed += 1;
            }
        }
    }
}

/// Flatten every annotated page of a multi-page document
pub fn flatten_document(
    pdf_bytes: &[u8],
    page_set: &PageAnnotationSet,
    options: &FlattenOptions,
) -> Result<FlattenedDocument, FlattenError> {
    let mut doc = document::load(pdf_bytes)?;
    let pages = doc.get_pages();
    let mut report = FlattenReport::default();

    for (page_number, annotations) in page_set.pages() {
        if annotations.is_empty() {
            continue;
        }
        let Some(page_id) = pages.get(&page_number).copied() else {
            tracing::warn!(page = page_number, page_count = pages.len(), "annotations target a missing page");
            report.missing_pages += 1;
            continue;
        };

        let geometry = document::page_geometry(&doc, page_id);
        let taken = document::prepare_resources(&mut doc, page_id)?;
        let mut canvas = ContentCanvas::new(geometry, taken);
        flatten_page(&mut canvas, page_number, annotations, options, &mut report);
        document::commit(&mut doc, page_id, canvas.into_content())?;
        report.pages_flattened += 1;
    }

    let bytes = document::save(doc, options.compress)?;
    tracing::info!(
        pages = report.pages_flattened,
        drawn = report.drawn,
        placeholders = report.placeholders,
        ignored = report.ignored,
        failed = report.failed,
        "flattened document"
    );

    Ok(FlattenedDocument { bytes, report })
}

/// Flatten page by page, loading each annotated page through `source`
///
/// Each page's bytes are a standalone document whose first page is the one
/// being annotated.
pub fn flatten_pages(
    source: &dyn PageSource,
    page_set: &PageAnnotationSet,
    options: &FlattenOptions,
) -> Result<FlattenedPages, FlattenError> {
    let mut pages = BTreeMap::new();
    let mut report = FlattenReport::default();

    for (page_number, annotations) in page_set.pages() {
        if annotations.is_empty() {
            continue;
        }

        let bytes = source.page_bytes(page_number)?;
        let mut single = PageAnnotationSet::new();
        single.set_raw_page(1, annotations.to_vec());
        let flattened = flatten_document(&bytes, &single, options)?;
        report.merge(&flattened.report);
        pages.insert(page_number, flattened.bytes);
    }

    tracing::info!(pages = pages.len(), failed = report.failed, "flattened pages");
    Ok(FlattenedPages { pages, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::tests::sample_pdf;
    use crate::raster::tests::png_data_uri;
    use crate::render::tests::{Mark, RecordingCanvas};
    use lopdf::content::Content;
    use lopdf::{Document, Object};
    use serde_json::json;

    fn operators(doc: &Document, page_number: u32) -> Vec<String> {
        let page_id = *doc.get_pages().get(&page_number).expect("page exists");
        let bytes = doc.get_page_content(page_id).expect("page content");
        Content::decode(&bytes).expect("content decodes").operations.into_iter().map(|op| op.operator).collect()
    }

    fn uncompressed() -> FlattenOptions {
        FlattenOptions::default().with_compress(false)
    }

    #[test]
    fn malformed_annotation_does_not_stop_the_page() {
        let mut canvas = RecordingCanvas::new(612.0, 792.0);
        let annotations = vec![
            RawAnnotation(json!({"type": "i-text", "text": "first", "left": 10, "top": 10})),
            RawAnnotation(json!({"type": "i-text", "text": "second", "left": "nowhere"})),
            RawAnnotation(json!({"type": "i-text", "text": "third", "left": 10, "top": 40})),
        ];
        let mut report = FlattenReport::default();

        flatten_page(&mut canvas, 1, &annotations, &FlattenOptions::default(), &mut report);

        let texts: Vec<&str> = canvas
            .marks
            .iter()
            .filter_map(|mark| match mark {
                Mark::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["first", "third"]);
        assert_eq!(report.drawn, 2);
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn untagged_annotations_are_ignored_not_failed() {
        let mut canvas = RecordingCanvas::new(612.0, 792.0);
        let annotations = vec![
            RawAnnotation(json!({"left": 10, "top": 10})),
            RawAnnotation(json!({"type": 3})),
            RawAnnotation(json!({"type": "i-text", "text": "kept", "left": 10, "top": 40})),
        ];
        let mut report = FlattenReport::default();

        flatten_page(&mut canvas, 1, &annotations, &FlattenOptions::default(), &mut report);

        assert_eq!(canvas.marks.len(), 1);
        assert_eq!(report.ignored, 2);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn later_annotations_draw_on_top() {
        let mut canvas = RecordingCanvas::new(612.0, 792.0);
        let annotations = vec![
            RawAnnotation(json!({"type": "path", "path": "M 0 0 L 5 5"})),
            RawAnnotation(json!({"type": "i-text", "text": "over"})),
            RawAnnotation(json!({"type": "rect"})),
        ];
        let mut report = FlattenReport::default();

        flatten_page(&mut canvas, 1, &annotations, &FlattenOptions::default(), &mut report);

        assert!(matches!(canvas.marks[0], Mark::Polyline(..)));
        assert!(matches!(canvas.marks[1], Mark::Text { .. }));
        assert_eq!(report.ignored, 1);
    }

    #[test]
    fn document_pages_receive_marks_inside_restored_state() {
        let pdf = sample_pdf(&[(612, 792), (612, 792)]);
        let mut set = PageAnnotationSet::new();
        set.push_raw(2, json!({"type": "path", "path": [["M", 0, 0], ["L", 100, 50]], "stroke": "#ff0000"}));
        set.push_raw(2, json!({"type": "i-text", "text": "Signed", "left": 72, "top": 600, "fontSize": 14}));
        set.push_raw(2, json!({
            "type": "image", "src": png_data_uri(8, 4, 200),
            "left": 300, "top": 650, "width": 80, "height": 40
        }));

        let flattened = flatten_document(&pdf, &set, &uncompressed()).expect("flatten should succeed");
        assert_eq!(flattened.report.pages_flattened, 1);
        assert_eq!(flattened.report.drawn, 3);

        let doc = Document::load_mem(&flattened.bytes).expect("output should load");
        assert_eq!(doc.get_pages().len(), 2);

        let untouched = operators(&doc, 1);
        assert_eq!(untouched.first().map(String::as_str), Some("BT"));

        let ops = operators(&doc, 2);
        assert_eq!(ops.first().map(String::as_str), Some("q"));
        let restore = ops.iter().position(|op| op == "Q").expect("Q after original content");
        let original = ops.iter().position(|op| op == "Tj").expect("original text");
        assert!(original < restore);
        for expected in ["S", "Tj", "Do"] {
            assert!(ops[restore..].iter().any(|op| op == expected), "missing {expected}");
        }

        let page_id = *doc.get_pages().get(&2).expect("page 2");
        let resources = doc
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Resources"))
            .and_then(Object::as_dict)
            .expect("page resources");
        let fonts = resources.get(b"Font").and_then(Object::as_dict).expect("fonts");
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"SfF1"));
        let xobjects = resources.get(b"XObject").and_then(Object::as_dict).expect("xobjects");
        assert!(xobjects.has(b"SfIm1"));
    }

    #[test]
    fn empty_and_missing_pages_are_skipped() {
        let pdf = sample_pdf(&[(612, 792)]);
        let set: PageAnnotationSet = serde_json::from_value(json!({
            "1": [],
            "7": [{"type": "i-text", "text": "lost"}]
        }))
        .expect("set should parse");

        let flattened = flatten_document(&pdf, &set, &uncompressed()).expect("flatten should succeed");
        assert_eq!(flattened.report.pages_flattened, 0);
        assert_eq!(flattened.report.missing_pages, 1);

        let doc = Document::load_mem(&flattened.bytes).expect("output should load");
        assert_eq!(operators(&doc, 1).first().map(String::as_str), Some("BT"));
    }

    #[test]
    fn compressed_output_still_loads() {
        let pdf = sample_pdf(&[(300, 300)]);
        let mut set = PageAnnotationSet::new();
        set.push_raw(1, json!({"type": "i-text", "text": "Zoë ✓", "left": 5, "top": 5}));

        let flattened =
            flatten_document(&pdf, &set, &FlattenOptions::default()).expect("flatten should succeed");
        let doc = Document::load_mem(&flattened.bytes).expect("output should load");
        assert!(operators(&doc, 1).iter().any(|op| op == "Tj"));
    }

    #[test]
    fn unreadable_document_is_fatal() {
        let set = PageAnnotationSet::new();
        assert!(matches!(flatten_document(b"%PDF-broken", &set, &uncompressed()), Err(FlattenError::Parse(_))));
    }

    #[test]
    fn page_source_flattens_each_annotated_page() {
        let source: BTreeMap<u32, Vec<u8>> =
            [(1, sample_pdf(&[(612, 792)])), (3, sample_pdf(&[(400, 400)]))].into_iter().collect();
        let mut set = PageAnnotationSet::new();
        set.push_raw(3, json!({"type": "path", "path": "M 0 0 Q 5 10 10 0"}));
        set.set_page(1, &[]);

        let flattened = flatten_pages(&source, &set, &uncompressed()).expect("flatten should succeed");
        assert_eq!(flattened.pages.keys().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(flattened.report.drawn, 1);

        let doc = Document::load_mem(&flattened.pages[&3]).expect("page should load");
        assert!(operators(&doc, 1).iter().any(|op| op == "S"));
    }

    #[test]
    fn missing_source_page_is_fatal() {
        let source: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
        let mut set = PageAnnotationSet::new();
        set.push_raw(2, json!({"type": "i-text", "text": "x"}));

        let err = flatten_pages(&source, &set, &uncompressed()).expect_err("should fail");
        assert!(matches!(err, FlattenError::PageSource { page: 2, .. }));
    }
}
