//! lopdf-backed renderer.
//!
//! PDF inputs get two treatments at once: digit runs matching a detection
//! are overwritten inside the content-stream text operators (so the data is
//! gone, not merely covered), and detections with geometry get an opaque
//! box drawn over them. Image inputs are wrapped into a one-page PDF with
//! the boxes painted on top.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::{Result, SchwarzbergError};
use crate::render::Renderer;
use crate::types::{BBox, Detection};

const BOX_PADDING: f64 = 2.0;
const HIGHLIGHT_COLOR: [f32; 3] = [1.0, 0.82, 0.0];
const JPEG_QUALITY: u8 = 90;

#[derive(Default)]
pub struct PdfRenderer;

impl Renderer for PdfRenderer {
    fn redact(&self, input: &Path, detections: &[Detection], output: &Path) -> Result<usize> {
        if is_pdf(input) {
            redact_pdf(input, detections, output)
        } else {
            wrap_image(input, detections, output, BoxStyle::Opaque)?;
            Ok(detections.len())
        }
    }

    fn highlight(&self, input: &Path, detections: &[Detection], output: &Path) -> Result<()> {
        if is_pdf(input) {
            highlight_pdf(input, detections, output)
        } else {
            wrap_image(input, detections, output, BoxStyle::Outline)
        }
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn redact_pdf(input: &Path, detections: &[Detection], output: &Path) -> Result<usize> {
    let mut doc = Document::load(input)?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    let mut applied = 0;

    for (page_number, page_id) in pages {
        let page_index = (page_number as usize).saturating_sub(1);
        let page_dets: Vec<&Detection> =
            detections.iter().filter(|d| d.page == page_index).collect();
        if page_dets.is_empty() {
            continue;
        }

        let data = doc.get_page_content(page_id)?;
        let mut content = Content::decode(&data)?;
        let scrubbed = scrub_digit_runs(&mut content, &page_dets);
        debug!(page = page_index, scrubbed, "scrubbed digit bytes");

        let height = page_height(&doc, page_id);
        for det in &page_dets {
            if !det.bbox.is_empty() {
                push_box(&mut content, det.bbox, height, BoxStyle::Opaque);
            }
        }
        doc.change_page_content(page_id, content.encode()?)?;
        applied += page_dets.len();
    }

    doc.save(output)?;
    Ok(applied)
}

fn highlight_pdf(input: &Path, detections: &[Detection], output: &Path) -> Result<()> {
    let mut doc = Document::load(input)?;
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();

    for (page_number, page_id) in pages {
        let page_index = (page_number as usize).saturating_sub(1);
        let height = page_height(&doc, page_id);
        let mut annot_ids = Vec::new();
        for det in detections.iter().filter(|d| d.page == page_index) {
            if det.bbox.is_empty() {
                continue;
            }
            let rect = flip_rect(det.bbox, height);
            let annot = dictionary! {
                "Type" => "Annot",
                "Subtype" => "Square",
                "Rect" => vec![
                    Object::Real(rect.x0 as f32),
                    Object::Real(rect.y0 as f32),
                    Object::Real(rect.x1 as f32),
                    Object::Real(rect.y1 as f32),
                ],
                "C" => color_array(),
                "IC" => color_array(),
                "CA" => Object::Real(0.35),
                "F" => 4,
                "Contents" => Object::string_literal(det.masked.as_str()),
            };
            annot_ids.push(doc.add_object(annot));
        }
        if !annot_ids.is_empty() {
            append_annotations(&mut doc, page_id, annot_ids)?;
        }
    }

    doc.save(output)?;
    Ok(())
}

fn color_array() -> Object {
    Object::Array(
        HIGHLIGHT_COLOR
            .iter()
            .map(|c| Object::Real(*c))
            .collect(),
    )
}

fn append_annotations(doc: &mut Document, page_id: ObjectId, annot_ids: Vec<ObjectId>) -> Result<()> {
    let new_refs: Vec<Object> = annot_ids.into_iter().map(Object::Reference).collect();
    // Annots may be absent, a direct array, or a reference to one.
    let existing = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|d| d.get(b"Annots").ok().cloned());
    match existing {
        Some(Object::Reference(array_id)) => {
            let array = doc.get_object_mut(array_id)?;
            if let Object::Array(items) = array {
                items.extend(new_refs);
            } else {
                *array = Object::Array(new_refs);
            }
        }
        Some(Object::Array(mut items)) => {
            items.extend(new_refs);
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Annots", Object::Array(items));
        }
        _ => {
            let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page.set("Annots", Object::Array(new_refs));
        }
    }
    Ok(())
}

/// Location of one digit byte inside the decoded content stream.
struct DigitRef {
    op: usize,
    operand: usize,
    /// Index within a TJ array, when the string sits inside one.
    element: Option<usize>,
    byte: usize,
}

fn collect_digits(bytes: &[u8], op: usize, operand: usize, element: Option<usize>, stream: &mut String, refs: &mut Vec<DigitRef>) {
    for (byte, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            stream.push(*b as char);
            refs.push(DigitRef {
                op,
                operand,
                element,
                byte,
            });
        }
    }
}

/// Overwrite, in place, every digit belonging to a detected value.
///
/// Text operators split numbers across strings and kerning arrays, so the
/// match runs over the page's concatenated digit stream and maps hits back
/// to individual bytes. Returns how many bytes were rewritten.
fn scrub_digit_runs(content: &mut Content, detections: &[&Detection]) -> usize {
    let mut stream = String::new();
    let mut refs: Vec<DigitRef> = Vec::new();
    for (oi, op) in content.operations.iter().enumerate() {
        if !matches!(op.operator.as_str(), "Tj" | "TJ" | "'" | "\"") {
            continue;
        }
        for (pi, operand) in op.operands.iter().enumerate() {
            match operand {
                Object::String(bytes, _) => {
                    collect_digits(bytes, oi, pi, None, &mut stream, &mut refs);
                }
                Object::Array(items) => {
                    for (ei, item) in items.iter().enumerate() {
                        if let Object::String(bytes, _) = item {
                            collect_digits(bytes, oi, pi, Some(ei), &mut stream, &mut refs);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    let mut marked = vec![false; refs.len()];
    for det in detections {
        if det.raw.is_empty() || !det.raw.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        for (start, _) in stream.match_indices(&det.raw) {
            for flag in marked.iter_mut().skip(start).take(det.raw.len()) {
                *flag = true;
            }
        }
    }

    let mut rewritten = 0;
    for (ri, digit_ref) in refs.iter().enumerate() {
        if !marked[ri] {
            continue;
        }
        let Some(op) = content.operations.get_mut(digit_ref.op) else {
            continue;
        };
        let target = match digit_ref.element {
            None => op.operands.get_mut(digit_ref.operand),
            Some(ei) => match op.operands.get_mut(digit_ref.operand) {
                Some(Object::Array(items)) => items.get_mut(ei),
                _ => None,
            },
        };
        if let Some(Object::String(bytes, _)) = target {
            if let Some(b) = bytes.get_mut(digit_ref.byte) {
                *b = b'*';
                rewritten += 1;
            }
        }
    }
    rewritten
}

#[derive(Clone, Copy)]
enum BoxStyle {
    /// Filled black, for redaction.
    Opaque,
    /// Colored outline, review artifacts only.
    Outline,
}

/// Detection geometry is top-left origin; PDF user space is bottom-left.
fn flip_rect(bbox: BBox, page_height: f64) -> BBox {
    BBox::new(bbox.x0, page_height - bbox.y1, bbox.x1, page_height - bbox.y0)
}

fn push_box(content: &mut Content, bbox: BBox, page_height: f64, style: BoxStyle) {
    let rect = flip_rect(bbox, page_height);
    let x = (rect.x0 - BOX_PADDING) as f32;
    let y = (rect.y0 - BOX_PADDING) as f32;
    let w = (rect.width() + 2.0 * BOX_PADDING) as f32;
    let h = (rect.height() + 2.0 * BOX_PADDING) as f32;
    content.operations.push(Operation::new("q", vec![]));
    match style {
        BoxStyle::Opaque => {
            content.operations.push(Operation::new(
                "rg",
                vec![0.into(), 0.into(), 0.into()],
            ));
            content.operations.push(Operation::new(
                "re",
                vec![
                    Object::Real(x),
                    Object::Real(y),
                    Object::Real(w),
                    Object::Real(h),
                ],
            ));
            content.operations.push(Operation::new("f", vec![]));
        }
        BoxStyle::Outline => {
            content.operations.push(Operation::new(
                "RG",
                HIGHLIGHT_COLOR.iter().map(|c| Object::Real(*c)).collect(),
            ));
            content
                .operations
                .push(Operation::new("w", vec![Object::Real(2.0)]));
            content.operations.push(Operation::new(
                "re",
                vec![
                    Object::Real(x),
                    Object::Real(y),
                    Object::Real(w),
                    Object::Real(h),
                ],
            ));
            content.operations.push(Operation::new("S", vec![]));
        }
    }
    content.operations.push(Operation::new("Q", vec![]));
}

fn page_height(doc: &Document, page_id: ObjectId) -> f64 {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|dict| dict.get(b"MediaBox").ok())
        .and_then(|obj| obj.as_array().ok())
        .and_then(|arr| arr.get(3))
        .and_then(object_as_f64)
        .unwrap_or(792.0)
}

fn object_as_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

/// Wrap an image input into a one-page PDF, boxes painted on top. The page
/// is sized 1pt per pixel so detection geometry carries over directly.
fn wrap_image(input: &Path, detections: &[Detection], output: &Path, style: BoxStyle) -> Result<()> {
    let img = image::open(input)
        .map_err(|err| SchwarzbergError::Render {
            message: format!("cannot decode image {}", input.display()),
            source: Some(Box::new(err)),
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode(
            img.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|err| SchwarzbergError::Render {
            message: "jpeg encoding failed".to_string(),
            source: Some(Box::new(err)),
        })?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));
    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    });

    let mut content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(width as f32),
                    0.into(),
                    0.into(),
                    Object::Real(height as f32),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    for det in detections.iter().filter(|d| d.page == 0 && !d.bbox.is_empty()) {
        push_box(&mut content, det.bbox, height as f64, style);
    }

    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            Object::Real(width as f32),
            Object::Real(height as f32),
        ],
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
    doc.save(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::write_minimal_pdf;
    use crate::types::{DetectionKind, Severity, SpanSource};

    fn pan_detection(raw: &str, bbox: BBox) -> Detection {
        Detection {
            kind: DetectionKind::Pan,
            masked: "**** **** **** 1111".to_string(),
            raw: raw.to_string(),
            bbox,
            page: 0,
            source: SpanSource::TextLayer,
            confidence: 1.0,
            validators: vec!["luhn".to_string()],
            severity: Severity::Hit,
        }
    }

    #[test]
    fn test_redaction_destroys_digits_in_text_layer() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("card.pdf");
        let output = dir.path().join("card_redacted.pdf");
        write_minimal_pdf(&input, &["Card: 4111 1111 1111 1111", "keep this line"]).unwrap();

        let applied = PdfRenderer
            .redact(&input, &[pan_detection("4111111111111111", BBox::default())], &output)
            .unwrap();
        assert_eq!(applied, 1);

        let text = Document::load(&output).unwrap().extract_text(&[1]).unwrap();
        assert!(!text.contains("4111"), "digits survived: {text}");
        assert!(text.contains("keep this line"));
    }

    #[test]
    fn test_unrelated_digits_survive_redaction() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("doc_redacted.pdf");
        write_minimal_pdf(&input, &["Card: 4111 1111 1111 1111", "Invoice 2024-0042"]).unwrap();

        PdfRenderer
            .redact(&input, &[pan_detection("4111111111111111", BBox::default())], &output)
            .unwrap();
        let text = Document::load(&output).unwrap().extract_text(&[1]).unwrap();
        assert!(text.contains("2024"));
    }

    #[test]
    fn test_highlight_adds_annotations_and_keeps_text() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.pdf");
        let output = dir.path().join("doc_highlighted.pdf");
        write_minimal_pdf(&input, &["Card: 4111 1111 1111 1111"]).unwrap();

        let det = pan_detection("4111111111111111", BBox::new(50.0, 40.0, 250.0, 54.0));
        PdfRenderer.highlight(&input, &[det], &output).unwrap();

        let doc = Document::load(&output).unwrap();
        let text = doc.extract_text(&[1]).unwrap();
        assert!(text.contains("4111"), "highlight must keep data legible");
        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.get(b"Annots").is_ok());
    }

    #[test]
    fn test_image_input_becomes_pdf_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("card.png");
        let output = dir.path().join("card_redacted.pdf");
        image::RgbImage::new(120, 80).save(&input).unwrap();

        let det = pan_detection("4111111111111111", BBox::new(10.0, 10.0, 110.0, 30.0));
        PdfRenderer.redact(&input, &[det], &output).unwrap();

        let doc = Document::load(&output).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
