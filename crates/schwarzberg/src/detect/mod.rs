//! Sensitive-data detectors and the strict redaction filter.

mod filter;
mod id_number;
mod mrz;
mod pan;

pub use filter::{strict_filter, STRUCTURAL_VALIDATORS};
pub use id_number::detect_id_numbers;
pub use mrz::detect_mrz;
pub use pan::{detect_pans, mask_pan, PanOptions};

use tracing::debug;

use crate::types::{Detection, DetectionKind, TextSpan};

/// Run the detectors a pack enables, in a stable order.
///
/// [`DetectionKind::Dob`] has no text detector; those detections arrive
/// from external vision collaborators and are merged upstream.
pub fn run_detectors(kinds: &[DetectionKind], spans: &[TextSpan]) -> Vec<Detection> {
    let mut detections = Vec::new();
    for kind in kinds {
        match kind {
            DetectionKind::Pan => {
                detections.extend(detect_pans(spans, &PanOptions::default()));
            }
            DetectionKind::Mrz => detections.extend(detect_mrz(spans)),
            DetectionKind::IdNumber => detections.extend(detect_id_numbers(spans)),
            DetectionKind::Dob => {
                debug!("dob detections come from external collaborators, nothing to run");
            }
        }
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_runs_enabled_detectors_only() {
        let spans = vec![TextSpan::text_layer("Card 4111 1111 1111 1111 No AB123456", 0)];
        let pan_only = run_detectors(&[DetectionKind::Pan], &spans);
        assert!(pan_only.iter().all(|d| d.kind == DetectionKind::Pan));
        assert_eq!(pan_only.len(), 1);

        let both = run_detectors(&[DetectionKind::Pan, DetectionKind::IdNumber], &spans);
        assert!(both.iter().any(|d| d.kind == DetectionKind::IdNumber));
    }
}
