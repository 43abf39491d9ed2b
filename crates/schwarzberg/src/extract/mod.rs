//! Candidate text extraction and quality gating.
//!
//! Two paths produce [`TextSpan`]s: the deterministic PDF text layer and
//! the OCR chain over rasterized pages. The extractor scores whichever path
//! ran and hands the pipeline either a usable extraction or the skip reason
//! that refusal should carry.

mod pdf_text;

pub use pdf_text::extract_text_spans;

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SchwarzbergError};
use crate::ocr::{run_chain, BackendAttempt, BackendMode, BackendSet, OcrRequest};
use crate::types::{SkipReason, SpanSource, TextSpan};

/// Substrings that mark a document as the kind we care about; their
/// presence nudges an otherwise-short text layer over the quality line.
const QUALITY_KEYWORDS: [&str; 4] = ["sort code", "account number", "iban", "statement"];

/// Character count at which a text layer scores 1.0 before the keyword
/// boost.
const FULL_QUALITY_CHARS: f64 = 2000.0;

const KEYWORD_BOOST: f64 = 0.1;

/// Which extraction path a pack wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorMode {
    /// Text layer only; refuse with `quality_too_low` when it is thin.
    Text,
    /// OCR only (photo packs); refuse with `ocr_quality_too_low`.
    Ocr,
    /// Text layer first, OCR fallback when the layer is below threshold.
    Auto,
}

/// One finished extraction, whichever path produced it.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub spans: Vec<TextSpan>,
    /// Text path: length heuristic in [0,1.1] clamped to 1.0. OCR path:
    /// mean word confidence.
    pub quality_score: f64,
    pub source: SpanSource,
    /// Backend audit trail; empty for the text path.
    pub attempts: Vec<BackendAttempt>,
}

impl ExtractionResult {
    pub fn char_count(&self) -> usize {
        self.spans.iter().map(|s| s.text.chars().count()).sum()
    }

    fn empty_ocr() -> Self {
        Self {
            spans: Vec::new(),
            quality_score: 0.0,
            source: SpanSource::Ocr,
            attempts: Vec::new(),
        }
    }
}

/// Quality gate outcome: either the pipeline proceeds to detection, or it
/// refuses with this exact reason.
#[derive(Debug)]
pub enum ExtractorVerdict {
    Usable(ExtractionResult),
    SubThreshold {
        reason: SkipReason,
        quality: f64,
        /// What was extracted anyway, kept for the run log.
        extraction: ExtractionResult,
    },
}

/// Quality thresholds for the two paths, taken from the active pack.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    pub text: f64,
    pub ocr: f64,
}

/// Length-plus-keywords heuristic for text-layer quality.
pub fn estimate_text_quality(spans: &[TextSpan]) -> f64 {
    let chars: usize = spans.iter().map(|s| s.text.chars().count()).sum();
    let mut score = (chars as f64 / FULL_QUALITY_CHARS).min(1.0);
    let lowered: String = spans
        .iter()
        .map(|s| s.text.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");
    if QUALITY_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        score += KEYWORD_BOOST;
    }
    score.min(1.0)
}

/// Turns a PDF into per-page images for the OCR chain.
///
/// Rasterization is a host capability like the engines themselves; a host
/// without it degrades to empty OCR output and the quality refusal that
/// follows.
pub trait PageRasterizer {
    fn is_available(&self) -> bool;

    /// Render every page of `input` into `scratch`, returning image paths
    /// in page order.
    fn rasterize(&self, input: &Path, scratch: &Path) -> Result<Vec<PathBuf>>;

    /// Points per rendered pixel, for mapping OCR geometry back onto the
    /// page. 1.0 when the images are not renderings of a PDF page.
    fn points_per_pixel(&self) -> f64 {
        1.0
    }
}

/// `pdftoppm`-based rasterizer (poppler-utils).
pub struct PdftoppmRasterizer {
    binary: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self {
            binary: "pdftoppm".to_string(),
            dpi,
        }
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(300)
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn is_available(&self) -> bool {
        crate::ocr::binary_on_path(&self.binary)
    }

    fn rasterize(&self, input: &Path, scratch: &Path) -> Result<Vec<PathBuf>> {
        let prefix = scratch.join("page");
        let output = Command::new(&self.binary)
            .args(["-r", &self.dpi.to_string(), "-png"])
            .arg(input)
            .arg(&prefix)
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchwarzbergError::render(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let mut pages: Vec<PathBuf> = std::fs::read_dir(scratch)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().map(|e| e == "png").unwrap_or(false))
            .collect();
        // pdftoppm zero-pads page numbers, so lexical order is page order.
        pages.sort();
        Ok(pages)
    }

    fn points_per_pixel(&self) -> f64 {
        72.0 / self.dpi as f64
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Runs whichever extraction path the pack asked for and applies the
/// quality gate.
pub struct Extractor<'a> {
    backends: &'a BackendSet,
    rasterizer: &'a dyn PageRasterizer,
}

impl<'a> Extractor<'a> {
    pub fn new(backends: &'a BackendSet, rasterizer: &'a dyn PageRasterizer) -> Self {
        Self {
            backends,
            rasterizer,
        }
    }

    pub fn extract(
        &self,
        input: &Path,
        mode: ExtractorMode,
        backend_mode: BackendMode,
        thresholds: QualityThresholds,
    ) -> Result<ExtractorVerdict> {
        match mode {
            ExtractorMode::Text => {
                let extraction = self.text_layer(input)?;
                Ok(gate(extraction, thresholds.text, SkipReason::QualityTooLow))
            }
            ExtractorMode::Ocr => {
                let extraction = self.ocr(input, backend_mode, thresholds.ocr)?;
                Ok(gate(extraction, thresholds.ocr, SkipReason::OcrQualityTooLow))
            }
            ExtractorMode::Auto => {
                let text = self.text_layer(input)?;
                if text.quality_score >= thresholds.text {
                    return Ok(ExtractorVerdict::Usable(text));
                }
                debug!(
                    quality = text.quality_score,
                    "text layer below threshold, falling back to OCR"
                );
                let extraction = self.ocr(input, backend_mode, thresholds.ocr)?;
                Ok(gate(extraction, thresholds.ocr, SkipReason::OcrQualityTooLow))
            }
        }
    }

    fn text_layer(&self, input: &Path) -> Result<ExtractionResult> {
        let spans = if is_pdf(input) {
            extract_text_spans(input)?
        } else {
            // Images have no text layer; the score is simply zero.
            Vec::new()
        };
        let quality_score = estimate_text_quality(&spans);
        Ok(ExtractionResult {
            spans,
            quality_score,
            source: SpanSource::TextLayer,
            attempts: Vec::new(),
        })
    }

    fn ocr(
        &self,
        input: &Path,
        backend_mode: BackendMode,
        acceptance_floor: f64,
    ) -> Result<ExtractionResult> {
        // Scratch dir for page images; dropped (and removed) when OCR ends.
        let scratch = tempfile::tempdir()?;
        let pages: Vec<PathBuf> = if is_pdf(input) {
            if !self.rasterizer.is_available() {
                warn!("no rasterizer on this host, OCR path yields nothing");
                return Ok(ExtractionResult::empty_ocr());
            }
            self.rasterizer.rasterize(input, scratch.path())?
        } else {
            vec![input.to_path_buf()]
        };

        // Word geometry arrives in raster pixels; scale back to points so
        // detections line up with the page the renderer will draw on.
        let scale = if is_pdf(input) {
            self.rasterizer.points_per_pixel()
        } else {
            1.0
        };
        let mut spans = Vec::new();
        let mut attempts = Vec::new();
        let mut confidence_sum = 0.0;
        let mut word_count = 0usize;
        let request = OcrRequest::default();
        for (page, image) in pages.iter().enumerate() {
            let chain = run_chain(self.backends, backend_mode, image, &request, acceptance_floor)?;
            attempts.extend(chain.attempts);
            if let Some(output) = chain.output {
                for word in output.words {
                    let bbox = crate::types::BBox::new(
                        word.bbox.x0 * scale,
                        word.bbox.y0 * scale,
                        word.bbox.x1 * scale,
                        word.bbox.y1 * scale,
                    );
                    confidence_sum += word.confidence;
                    word_count += 1;
                    spans.push(TextSpan::ocr(word.text, bbox, page, word.confidence));
                }
            }
        }

        let quality_score = if word_count == 0 {
            0.0
        } else {
            confidence_sum / word_count as f64
        };
        Ok(ExtractionResult {
            spans,
            quality_score,
            source: SpanSource::Ocr,
            attempts,
        })
    }
}

fn gate(extraction: ExtractionResult, threshold: f64, reason: SkipReason) -> ExtractorVerdict {
    if extraction.quality_score >= threshold {
        ExtractorVerdict::Usable(extraction)
    } else {
        ExtractorVerdict::SubThreshold {
            reason,
            quality: extraction.quality_score,
            extraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BackendKind, BackendOutcome, OcrBackend, OcrOutput, OcrWord};
    use crate::render::write_minimal_pdf;
    use crate::types::BBox;

    struct StubBackend {
        confidence: f64,
    }

    impl OcrBackend for StubBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Tesseract
        }

        fn is_available(&self) -> bool {
            true
        }

        fn recognize(&self, _image: &Path, _request: &OcrRequest) -> BackendOutcome {
            BackendOutcome::Success(OcrOutput::from_words(
                BackendKind::Tesseract,
                vec![OcrWord {
                    text: "4111111111111111".to_string(),
                    bbox: BBox::new(10.0, 10.0, 200.0, 30.0),
                    confidence: self.confidence,
                }],
            ))
        }
    }

    struct PassthroughRasterizer;

    impl PageRasterizer for PassthroughRasterizer {
        fn is_available(&self) -> bool {
            true
        }

        fn rasterize(&self, input: &Path, _scratch: &Path) -> Result<Vec<PathBuf>> {
            Ok(vec![input.to_path_buf()])
        }
    }

    struct NoRasterizer;

    impl PageRasterizer for NoRasterizer {
        fn is_available(&self) -> bool {
            false
        }

        fn rasterize(&self, _input: &Path, _scratch: &Path) -> Result<Vec<PathBuf>> {
            unreachable!("probed unavailable")
        }
    }

    fn stub_set(confidence: f64) -> BackendSet {
        BackendSet::new(vec![Box::new(StubBackend { confidence })])
    }

    fn thresholds() -> QualityThresholds {
        QualityThresholds {
            text: 0.6,
            ocr: 0.6,
        }
    }

    #[test]
    fn test_quality_keyword_boost() {
        let plain = vec![TextSpan::text_layer("x".repeat(1000), 0)];
        let boosted = vec![
            TextSpan::text_layer("x".repeat(1000), 0),
            TextSpan::text_layer("IBAN GB29", 0),
        ];
        let base = estimate_text_quality(&plain);
        let with_kw = estimate_text_quality(&boosted);
        assert!(with_kw > base);
        assert!(with_kw <= 1.0);
    }

    #[test]
    fn test_quality_caps_at_one() {
        let spans = vec![TextSpan::text_layer("statement ".repeat(500), 0)];
        assert_eq!(estimate_text_quality(&spans), 1.0);
    }

    #[test]
    fn test_empty_document_scores_zero() {
        assert_eq!(estimate_text_quality(&[]), 0.0);
    }

    #[test]
    fn test_text_mode_refuses_thin_layer_with_quality_too_low() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thin.pdf");
        write_minimal_pdf(&path, &["hi"]).unwrap();

        let set = stub_set(0.99);
        let extractor = Extractor::new(&set, &PassthroughRasterizer);
        let verdict = extractor
            .extract(&path, ExtractorMode::Text, BackendMode::Auto, thresholds())
            .unwrap();
        match verdict {
            ExtractorVerdict::SubThreshold { reason, .. } => {
                assert_eq!(reason, SkipReason::QualityTooLow);
            }
            ExtractorVerdict::Usable(_) => panic!("thin text layer must not pass the gate"),
        }
    }

    #[test]
    fn test_auto_falls_back_to_ocr_and_uses_ocr_reason() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_minimal_pdf(&path, &[]).unwrap();

        // OCR succeeds but below the floor: the refusal must say OCR.
        let set = stub_set(0.3);
        let extractor = Extractor::new(&set, &PassthroughRasterizer);
        let verdict = extractor
            .extract(&path, ExtractorMode::Auto, BackendMode::Auto, thresholds())
            .unwrap();
        match verdict {
            ExtractorVerdict::SubThreshold {
                reason, extraction, ..
            } => {
                assert_eq!(reason, SkipReason::OcrQualityTooLow);
                assert_eq!(extraction.source, SpanSource::Ocr);
                assert!(!extraction.attempts.is_empty());
            }
            ExtractorVerdict::Usable(_) => panic!("sub-floor OCR must not pass the gate"),
        }
    }

    #[test]
    fn test_ocr_mode_accepts_confident_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.png");
        std::fs::write(&path, b"not really a png").unwrap();

        let set = stub_set(0.9);
        let extractor = Extractor::new(&set, &PassthroughRasterizer);
        let verdict = extractor
            .extract(&path, ExtractorMode::Ocr, BackendMode::Auto, thresholds())
            .unwrap();
        match verdict {
            ExtractorVerdict::Usable(extraction) => {
                assert_eq!(extraction.source, SpanSource::Ocr);
                assert_eq!(extraction.spans.len(), 1);
                assert!((extraction.quality_score - 0.9).abs() < 1e-9);
            }
            ExtractorVerdict::SubThreshold { .. } => panic!("confident OCR must pass"),
        }
    }

    #[test]
    fn test_missing_rasterizer_degrades_to_quality_refusal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_minimal_pdf(&path, &[]).unwrap();

        let set = stub_set(0.9);
        let extractor = Extractor::new(&set, &NoRasterizer);
        let verdict = extractor
            .extract(&path, ExtractorMode::Ocr, BackendMode::Auto, thresholds())
            .unwrap();
        match verdict {
            ExtractorVerdict::SubThreshold {
                reason, quality, ..
            } => {
                assert_eq!(reason, SkipReason::OcrQualityTooLow);
                assert_eq!(quality, 0.0);
            }
            ExtractorVerdict::Usable(_) => panic!("no rasterizer, nothing can be usable"),
        }
    }
}
