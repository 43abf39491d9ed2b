//! Core data model for the redaction decision pipeline.
//!
//! Everything here is a value type: constructed per run, serialized at the
//! boundary, and discarded once the [`RedactionOutcome`] has been produced.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchwarzbergError};

/// Axis-aligned bounding box in page coordinates (x0, y0, x1, y1).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).max(0.0)
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).max(0.0)
    }

    /// Vertical center, used for grouping OCR words into lines.
    pub fn y_center(&self) -> f64 {
        (self.y0 + self.y1) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0.0 && self.height() == 0.0
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Where a text span came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanSource {
    /// Deterministic PDF text-layer extraction (no OCR involved).
    TextLayer,
    /// Recognized by an OCR backend.
    Ocr,
}

/// A positioned piece of extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
    pub page: usize,
    pub source: SpanSource,
    /// Word-level OCR confidence in [0,1]; `None` for text-layer spans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl TextSpan {
    /// Text-layer span without geometry (lopdf gives us text, not layout).
    pub fn text_layer(text: impl Into<String>, page: usize) -> Self {
        Self {
            text: text.into(),
            bbox: BBox::default(),
            page,
            source: SpanSource::TextLayer,
            confidence: None,
        }
    }

    pub fn ocr(text: impl Into<String>, bbox: BBox, page: usize, confidence: f64) -> Self {
        Self {
            text: text.into(),
            bbox,
            page,
            source: SpanSource::Ocr,
            confidence: Some(confidence),
        }
    }
}

/// Kind of regulated data a detection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Primary Account Number (payment card).
    Pan,
    /// Machine-Readable Zone on identity documents.
    Mrz,
    /// National/document ID number.
    IdNumber,
    /// Date-of-birth region (reported by external vision collaborators).
    Dob,
}

impl DetectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Pan => "pan",
            DetectionKind::Mrz => "mrz",
            DetectionKind::IdNumber => "id_number",
            DetectionKind::Dob => "dob",
        }
    }
}

/// How certain the detector is that a candidate is real sensitive data.
///
/// `Hit` passed structural validation; `Suspicion` only matched loosely
/// (typically a low-confidence OCR reading that failed its checksum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Hit,
    Suspicion,
}

/// A candidate sensitive-data match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub kind: DetectionKind,
    /// Masked display form, safe for logs and reports.
    pub masked: String,
    /// Raw matched value. Never logged.
    pub raw: String,
    pub bbox: BBox,
    pub page: usize,
    pub source: SpanSource,
    /// Confidence in [0,1]; text-layer matches are 1.0 by definition.
    pub confidence: f64,
    /// Names of structural validators the candidate passed (`luhn`,
    /// `mrz_pattern`, ...). Empty for loose pattern matches.
    pub validators: Vec<String>,
    pub severity: Severity,
}

impl Detection {
    /// Scores outside [0,1] are a defect in the producing detector, not a
    /// state the rest of the pipeline should ever observe.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchwarzbergError::validation(format!(
                "detection confidence out of range: {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// Reason for a policy refusal. Only meaningful on a skipped run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Deterministic (non-OCR) text extraction below threshold.
    QualityTooLow,
    /// OCR extraction below threshold (forced OCR or auto-fallback).
    OcrQualityTooLow,
    /// Extraction usable but no detection survived strict filtering.
    NoPiiFound,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::QualityTooLow => "quality_too_low",
            SkipReason::OcrQualityTooLow => "ocr_quality_too_low",
            SkipReason::NoPiiFound => "no_pii_found",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal record of a successful run.
///
/// Operational faults are the `Err` arm of [`Result`]; this sum type only
/// covers the two policy outcomes, which makes the invalid "reason and
/// output path both set" state unrepresentable.
#[derive(Debug, Clone, PartialEq)]
pub enum RedactionOutcome {
    Processed {
        output_path: PathBuf,
        redactions_applied: usize,
    },
    Skipped {
        reason: SkipReason,
    },
}

impl RedactionOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, RedactionOutcome::Processed { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            RedactionOutcome::Skipped { reason } => Some(*reason),
            RedactionOutcome::Processed { .. } => None,
        }
    }
}

/// Decision state at the external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Processed,
    Skipped,
    Error,
}

/// Language-agnostic decision payload returned to any caller.
///
/// Exactly one of `reason` / `output_path` is set for `processed` and
/// `skipped`; both are null for `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionPayload {
    pub status: RunStatus,
    pub reason: Option<SkipReason>,
    pub output_path: Option<String>,
}

impl DecisionPayload {
    pub fn from_run(result: &Result<RedactionOutcome>) -> Self {
        match result {
            Ok(RedactionOutcome::Processed { output_path, .. }) => Self {
                status: RunStatus::Processed,
                reason: None,
                output_path: Some(output_path.display().to_string()),
            },
            Ok(RedactionOutcome::Skipped { reason }) => Self {
                status: RunStatus::Skipped,
                reason: Some(*reason),
                output_path: None,
            },
            Err(_) => Self {
                status: RunStatus::Error,
                reason: None,
                output_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_serializes_snake_case() {
        let json = serde_json::to_string(&SkipReason::OcrQualityTooLow).unwrap();
        assert_eq!(json, "\"ocr_quality_too_low\"");
    }

    #[test]
    fn test_payload_from_processed_run() {
        let run = Ok(RedactionOutcome::Processed {
            output_path: PathBuf::from("/out/Bank1_redacted.pdf"),
            redactions_applied: 1,
        });
        let payload = DecisionPayload::from_run(&run);
        assert_eq!(payload.status, RunStatus::Processed);
        assert!(payload.reason.is_none());
        assert_eq!(payload.output_path.as_deref(), Some("/out/Bank1_redacted.pdf"));
    }

    #[test]
    fn test_payload_from_skipped_run_has_no_path() {
        let run = Ok(RedactionOutcome::Skipped {
            reason: SkipReason::NoPiiFound,
        });
        let payload = DecisionPayload::from_run(&run);
        assert_eq!(payload.status, RunStatus::Skipped);
        assert_eq!(payload.reason, Some(SkipReason::NoPiiFound));
        assert!(payload.output_path.is_none());
    }

    #[test]
    fn test_payload_from_error_run() {
        let run: Result<RedactionOutcome> =
            Err(SchwarzbergError::ArtifactMissing(PathBuf::from("/out/x.pdf")));
        let payload = DecisionPayload::from_run(&run);
        assert_eq!(payload.status, RunStatus::Error);
        assert!(payload.reason.is_none());
        assert!(payload.output_path.is_none());
    }

    #[test]
    fn test_detection_confidence_range_is_enforced() {
        let mut det = Detection {
            kind: DetectionKind::Pan,
            masked: "**** **** **** 1111".to_string(),
            raw: "4111111111111111".to_string(),
            bbox: BBox::default(),
            page: 0,
            source: SpanSource::TextLayer,
            confidence: 1.0,
            validators: vec!["luhn".to_string()],
            severity: Severity::Hit,
        };
        assert!(det.validate().is_ok());
        det.confidence = 1.2;
        assert!(det.validate().is_err());
    }

    #[test]
    fn test_bbox_union() {
        let a = BBox::new(10.0, 10.0, 20.0, 20.0);
        let b = BBox::new(15.0, 5.0, 30.0, 18.0);
        let u = a.union(&b);
        assert_eq!(u, BBox::new(10.0, 5.0, 30.0, 20.0));
    }
}
