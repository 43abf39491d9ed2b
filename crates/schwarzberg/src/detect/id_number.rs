//! Loose document-number detection.
//!
//! Alphanumeric runs that look like an ID number. There is no checksum to
//! validate against, so everything here is a suspicion: it shows up in
//! highlight artifacts for human review but never survives the strict
//! filter that drives redaction.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Detection, DetectionKind, Severity, TextSpan};

fn id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z0-9]{6,12}\b").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
    })
}

/// Minimum digits a run needs; pure words like "LONDON" are not IDs.
const MIN_DIGITS: usize = 4;

pub fn detect_id_numbers(spans: &[TextSpan]) -> Vec<Detection> {
    let mut out = Vec::new();
    for span in spans {
        for m in id_regex().find_iter(&span.text) {
            let value = m.as_str();
            if value.chars().filter(|c| c.is_ascii_digit()).count() < MIN_DIGITS {
                continue;
            }
            let masked = format!(
                "{}{}",
                "*".repeat(value.len().saturating_sub(2)),
                &value[value.len().saturating_sub(2)..]
            );
            out.push(Detection {
                kind: DetectionKind::IdNumber,
                masked,
                raw: value.to_string(),
                bbox: span.bbox,
                page: span.page,
                source: span.source,
                confidence: span.confidence.unwrap_or(1.0),
                validators: Vec::new(),
                severity: Severity::Suspicion,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_bearing_run_is_flagged() {
        let spans = vec![TextSpan::text_layer("Document No: AB123456", 0)];
        let hits = detect_id_numbers(&spans);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw, "AB123456");
        assert_eq!(hits[0].masked, "******56");
        assert_eq!(hits[0].severity, Severity::Suspicion);
        assert!(hits[0].validators.is_empty());
    }

    #[test]
    fn test_plain_words_are_ignored() {
        let spans = vec![TextSpan::text_layer("LONDON UNITED KINGDOM", 0)];
        assert!(detect_id_numbers(&spans).is_empty());
    }

    #[test]
    fn test_short_runs_are_ignored() {
        let spans = vec![TextSpan::text_layer("ref 12345", 0)];
        assert!(detect_id_numbers(&spans).is_empty());
    }
}
