//! Artifact rendering: redacted and highlighted PDFs.
//!
//! The pipeline talks to [`Renderer`] only, so decision tests can swap in a
//! fake that writes nothing (or lies about writing, which the pipeline must
//! catch). The real implementation is [`PdfRenderer`].

mod pdf;

pub use pdf::PdfRenderer;

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::Result;
use crate::types::Detection;

/// Default suffix appended to redacted artifacts.
pub const DEFAULT_REDACTED_SUFFIX: &str = "_redacted";

/// `{stem}{suffix}.pdf`. The name is a pure function of its inputs so
/// reruns land on the same path.
pub fn redacted_filename(stem: &str, suffix: &str) -> String {
    format!("{stem}{suffix}.pdf")
}

/// `{stem}_highlighted.pdf`; the highlight suffix is not configurable.
pub fn highlight_filename(stem: &str) -> String {
    format!("{stem}_highlighted.pdf")
}

/// Writes decision artifacts. Implementations must only report `Ok` after
/// the artifact is durably on disk; the pipeline re-checks anyway.
pub trait Renderer {
    /// Write a redacted copy of `input` to `output`, returning how many
    /// detections were inked out.
    fn redact(&self, input: &Path, detections: &[Detection], output: &Path) -> Result<usize>;

    /// Write a review copy with detections marked but still legible.
    fn highlight(&self, input: &Path, detections: &[Detection], output: &Path) -> Result<()>;
}

/// Build a small single-page PDF with a real text layer. Used by tests and
/// demos that need a deterministic input document.
pub fn write_minimal_pdf(path: &Path, lines: &[&str]) -> Result<()> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new(
            "Td",
            vec![50.into(), (750 - 20 * i as i64).into()],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_filename_is_deterministic() {
        assert_eq!(
            redacted_filename("Bank1", DEFAULT_REDACTED_SUFFIX),
            "Bank1_redacted.pdf"
        );
        assert_eq!(redacted_filename("Bank1", "_clean"), "Bank1_clean.pdf");
    }

    #[test]
    fn test_highlight_filename_is_pinned() {
        assert_eq!(highlight_filename("passport"), "passport_highlighted.pdf");
    }

    #[test]
    fn test_minimal_pdf_roundtrips_through_lopdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        write_minimal_pdf(&path, &["hello", "world"]).unwrap();
        let doc = Document::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("world"));
    }
}
