//! The strict gate between detection and redaction.
//!
//! Redaction is irreversible, so only candidates that pass a structural
//! validator (a checksum or fixed-format proof, not a mere pattern) with
//! enough confidence may drive it. Suspicions are for highlight artifacts
//! and review queues, never for ink.

use crate::error::Result;
use crate::types::{Detection, Severity};

/// Validators that prove structure rather than shape.
pub const STRUCTURAL_VALIDATORS: [&str; 2] = ["luhn", "mrz_pattern"];

fn has_structural_validator(detection: &Detection) -> bool {
    detection
        .validators
        .iter()
        .any(|v| STRUCTURAL_VALIDATORS.contains(&v.as_str()))
}

/// Keep only redaction-grade detections.
///
/// A confidence outside [0,1] anywhere in the input is a defect in the
/// producing detector and fails the whole run.
pub fn strict_filter(detections: Vec<Detection>, min_confidence: f64) -> Result<Vec<Detection>> {
    for detection in &detections {
        detection.validate()?;
    }
    Ok(detections
        .into_iter()
        .filter(|d| {
            d.severity == Severity::Hit
                && d.confidence >= min_confidence
                && has_structural_validator(d)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BBox, DetectionKind, SpanSource};

    fn det(severity: Severity, confidence: f64, validators: &[&str]) -> Detection {
        Detection {
            kind: DetectionKind::Pan,
            masked: "**** **** **** 1111".to_string(),
            raw: "4111111111111111".to_string(),
            bbox: BBox::default(),
            page: 0,
            source: SpanSource::Ocr,
            confidence,
            validators: validators.iter().map(|v| v.to_string()).collect(),
            severity,
        }
    }

    #[test]
    fn test_validated_confident_hit_passes() {
        let kept = strict_filter(vec![det(Severity::Hit, 0.9, &["luhn"])], 0.75).unwrap();
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_suspicion_never_passes() {
        let kept = strict_filter(vec![det(Severity::Suspicion, 0.99, &["luhn"])], 0.75).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_low_confidence_hit_is_dropped() {
        let kept = strict_filter(vec![det(Severity::Hit, 0.5, &["luhn"])], 0.75).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_pattern_only_hit_is_dropped() {
        let kept = strict_filter(vec![det(Severity::Hit, 0.9, &["pan_shape"])], 0.75).unwrap();
        assert!(kept.is_empty());
    }

    #[test]
    fn test_out_of_range_confidence_fails_the_run() {
        assert!(strict_filter(vec![det(Severity::Hit, 1.5, &["luhn"])], 0.75).is_err());
    }
}
