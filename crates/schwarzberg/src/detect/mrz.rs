//! Machine-Readable Zone detection on identity documents.
//!
//! An MRZ is two or three fixed-width lines drawn from `A-Z 0-9 <`. We look
//! for at least two qualifying lines per page; one alone is far too easy to
//! fake with tabular text.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{Detection, DetectionKind, Severity, SpanSource, TextSpan};

fn mrz_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Z0-9<]{30,44}$").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
    })
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| *c != ' ').collect()
}

/// One detection per page holding at least two MRZ-shaped lines.
pub fn detect_mrz(spans: &[TextSpan]) -> Vec<Detection> {
    let max_page = spans.iter().map(|s| s.page).max().unwrap_or(0);
    let mut detections = Vec::new();

    for page in 0..=max_page {
        let lines: Vec<(&TextSpan, String)> = spans
            .iter()
            .filter(|s| s.page == page)
            .filter_map(|s| {
                let compacted = compact(&s.text);
                mrz_line_regex()
                    .is_match(&compacted)
                    .then_some((s, compacted))
            })
            .collect();
        if lines.len() < 2 {
            continue;
        }

        let bbox = lines
            .iter()
            .skip(1)
            .fold(lines[0].0.bbox, |acc, (s, _)| acc.union(&s.bbox));
        let confidence = lines
            .iter()
            .map(|(s, _)| s.confidence.unwrap_or(1.0))
            .fold(f64::INFINITY, f64::min);
        let source = if lines.iter().any(|(s, _)| s.source == SpanSource::Ocr) {
            SpanSource::Ocr
        } else {
            SpanSource::TextLayer
        };
        let raw = lines
            .iter()
            .map(|(_, l)| l.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        detections.push(Detection {
            kind: DetectionKind::Mrz,
            masked: format!("mrz[{} lines]", lines.len()),
            raw,
            bbox,
            page,
            source,
            confidence,
            validators: vec!["mrz_pattern".to_string()],
            severity: Severity::Hit,
        });
    }
    detections
}
