//! Primary Account Number detection.
//!
//! Three recognition paths share one normalizer:
//! * text-layer spans, where a Luhn-valid digit run is a certain hit;
//! * single OCR words, where confusable letters are folded to digits and a
//!   Luhn failure on a low-confidence reading still surfaces as a
//!   suspicion;
//! * stitched OCR lines, rejoining card numbers the engine split into
//!   embossed groups of four.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{BBox, Detection, DetectionKind, Severity, SpanSource, TextSpan};

/// Characters OCR commonly reads in place of digits.
const CONFUSABLES: [(char, char); 11] = [
    ('O', '0'),
    ('o', '0'),
    ('I', '1'),
    ('i', '1'),
    ('l', '1'),
    ('S', '5'),
    ('s', '5'),
    ('B', '8'),
    ('b', '8'),
    ('Z', '2'),
    ('z', '2'),
];

/// Markers of an already-masked value; those are never re-detected.
const MASK_MARKERS: [char; 2] = ['*', '\u{2022}'];

const PAN_MIN_DIGITS: usize = 13;
const PAN_MAX_DIGITS: usize = 19;

#[derive(Debug, Clone)]
pub struct PanOptions {
    /// OCR readings below this confidence get the benefit of the doubt: a
    /// Luhn failure is reported as a suspicion instead of dropped, since
    /// the digits themselves may be misread.
    pub suspicion_floor: f64,
    /// Max vertical distance between word centers on one stitched line.
    pub line_y_tolerance: f64,
    /// Max horizontal gap between neighboring stitched words.
    pub max_x_gap: f64,
    /// Fraction of digit-like characters a word needs to join a stitch.
    pub min_digitish_ratio: f64,
    /// Words below this confidence never join a stitch.
    pub min_token_confidence: f64,
}

impl Default for PanOptions {
    fn default() -> Self {
        Self {
            suspicion_floor: 0.75,
            line_y_tolerance: 8.0,
            max_x_gap: 40.0,
            min_digitish_ratio: 0.5,
            min_token_confidence: 0.6,
        }
    }
}

fn candidate_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // 13-19 digit-or-confusable characters, allowing single separators.
        Regex::new(r"[0-9OoIilSsBbZz](?:[ \-]?[0-9OoIilSsBbZz]){12,18}")
            .unwrap_or_else(|e| unreachable!("static pattern: {e}"))
    })
}

fn is_pan_char(ch: char) -> bool {
    ch.is_ascii_digit() || CONFUSABLES.iter().any(|(from, _)| *from == ch)
}

/// Fold confusables and strip separators. `None` when the text carries mask
/// markers or any character that cannot be part of a card number.
fn normalize_digits(text: &str) -> Option<String> {
    if text.chars().any(|ch| MASK_MARKERS.contains(&ch)) {
        return None;
    }
    let mut digits = String::new();
    for ch in text.chars() {
        if ch == ' ' || ch == '-' {
            continue;
        }
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if let Some((_, to)) = CONFUSABLES.iter().find(|(from, _)| *from == ch) {
            digits.push(*to);
        } else {
            return None;
        }
    }
    Some(digits)
}

fn luhn_valid(digits: &str) -> bool {
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let mut sum = 0u32;
    for (i, ch) in digits.chars().rev().enumerate() {
        let mut d = ch.to_digit(10).unwrap_or(0);
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// Display form keeping only the last four digits, grouped by four.
pub fn mask_pan(digits: &str) -> String {
    let n = digits.chars().count();
    let visible_from = n.saturating_sub(4);
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && i % 4 == 0 {
            out.push(' ');
        }
        out.push(if i >= visible_from { ch } else { '*' });
    }
    out
}

/// Digit-run candidates in one span's text, with surrounding digit-like
/// characters ruled out so a longer run is never partially matched.
fn candidates_in(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    for m in candidate_regex().find_iter(text) {
        let before_ok = text[..m.start()]
            .chars()
            .next_back()
            .map(|c| !is_pan_char(c))
            .unwrap_or(true);
        let after_ok = text[m.end()..]
            .chars()
            .next()
            .map(|c| !is_pan_char(c))
            .unwrap_or(true);
        if before_ok && after_ok {
            found.push(m.as_str());
        }
    }
    found
}

fn detection(
    digits: String,
    span_bbox: BBox,
    page: usize,
    source: SpanSource,
    confidence: f64,
    validators: Vec<String>,
    severity: Severity,
) -> Detection {
    Detection {
        kind: DetectionKind::Pan,
        masked: mask_pan(&digits),
        raw: digits,
        bbox: span_bbox,
        page,
        source,
        confidence,
        validators,
        severity,
    }
}

/// Detect PANs across all spans, including stitched OCR lines.
pub fn detect_pans(spans: &[TextSpan], options: &PanOptions) -> Vec<Detection> {
    let mut detections = Vec::new();

    for span in spans {
        for candidate in candidates_in(&span.text) {
            let Some(digits) = normalize_digits(candidate) else {
                continue;
            };
            if !(PAN_MIN_DIGITS..=PAN_MAX_DIGITS).contains(&digits.chars().count()) {
                continue;
            }
            let passed_luhn = luhn_valid(&digits);
            match span.source {
                SpanSource::TextLayer => {
                    if passed_luhn {
                        detections.push(detection(
                            digits,
                            span.bbox,
                            span.page,
                            span.source,
                            1.0,
                            vec!["luhn".to_string()],
                            Severity::Hit,
                        ));
                    }
                }
                SpanSource::Ocr => {
                    let confidence = span.confidence.unwrap_or(0.0);
                    if passed_luhn {
                        detections.push(detection(
                            digits,
                            span.bbox,
                            span.page,
                            span.source,
                            confidence,
                            vec!["luhn".to_string()],
                            Severity::Hit,
                        ));
                    } else if confidence < options.suspicion_floor {
                        // Low confidence excuses the checksum failure; the
                        // digits themselves may be misread.
                        detections.push(detection(
                            digits,
                            span.bbox,
                            span.page,
                            span.source,
                            confidence,
                            vec!["pan_shape".to_string()],
                            Severity::Suspicion,
                        ));
                    }
                }
            }
        }
    }

    detections.extend(stitch_ocr_lines(spans, options));
    dedupe(detections)
}

/// Rejoin card numbers that OCR split into embossed groups ("4111 1111
/// 1111 1111" as four words). Windows of 2-6 adjacent digit-like words on
/// one visual line are concatenated and Luhn-checked.
fn stitch_ocr_lines(spans: &[TextSpan], options: &PanOptions) -> Vec<Detection> {
    let mut out = Vec::new();
    let max_page = spans.iter().map(|s| s.page).max().unwrap_or(0);

    for page in 0..=max_page {
        let mut tokens: Vec<&TextSpan> = spans
            .iter()
            .filter(|s| {
                s.page == page
                    && s.source == SpanSource::Ocr
                    && s.confidence.unwrap_or(0.0) >= options.min_token_confidence
                    && digitish_ratio(&s.text) >= options.min_digitish_ratio
            })
            .collect();
        tokens.sort_by(|a, b| {
            a.bbox
                .y_center()
                .partial_cmp(&b.bbox.y_center())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    a.bbox
                        .x0
                        .partial_cmp(&b.bbox.x0)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        // Greedy line grouping by vertical center.
        let mut lines: Vec<Vec<&TextSpan>> = Vec::new();
        for token in tokens {
            match lines.last_mut() {
                Some(line)
                    if (line[0].bbox.y_center() - token.bbox.y_center()).abs()
                        <= options.line_y_tolerance =>
                {
                    line.push(token);
                }
                _ => lines.push(vec![token]),
            }
        }

        for line in &mut lines {
            line.sort_by(|a, b| {
                a.bbox
                    .x0
                    .partial_cmp(&b.bbox.x0)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for start in 0..line.len() {
                for len in 2..=6usize {
                    let end = start + len;
                    if end > line.len() {
                        break;
                    }
                    let window = &line[start..end];
                    if window
                        .windows(2)
                        .any(|pair| pair[1].bbox.x0 - pair[0].bbox.x1 > options.max_x_gap)
                    {
                        break;
                    }
                    let joined: String =
                        window.iter().map(|s| s.text.as_str()).collect::<String>();
                    let Some(digits) = normalize_digits(&joined) else {
                        continue;
                    };
                    if !(PAN_MIN_DIGITS..=PAN_MAX_DIGITS).contains(&digits.chars().count())
                        || !luhn_valid(&digits)
                    {
                        continue;
                    }
                    let bbox = window
                        .iter()
                        .fold(window[0].bbox, |acc, s| acc.union(&s.bbox));
                    let confidence = window
                        .iter()
                        .map(|s| s.confidence.unwrap_or(0.0))
                        .fold(f64::INFINITY, f64::min);
                    out.push(detection(
                        digits,
                        bbox,
                        page,
                        SpanSource::Ocr,
                        confidence,
                        vec!["luhn".to_string(), "stitched".to_string()],
                        Severity::Hit,
                    ));
                }
            }
        }
    }
    out
}

fn digitish_ratio(text: &str) -> f64 {
    let total = text.chars().filter(|c| *c != ' ' && *c != '-').count();
    if total == 0 {
        return 0.0;
    }
    let digitish = text.chars().filter(|c| is_pan_char(*c)).count();
    digitish as f64 / total as f64
}

/// One detection per (page, digits): hits beat suspicions, then higher
/// confidence wins.
fn dedupe(mut detections: Vec<Detection>) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        (a.page, &a.raw)
            .cmp(&(b.page, &b.raw))
            .then_with(|| match (a.severity, b.severity) {
                (Severity::Hit, Severity::Suspicion) => std::cmp::Ordering::Less,
                (Severity::Suspicion, Severity::Hit) => std::cmp::Ordering::Greater,
                _ => b
                    .confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            })
    });
    detections.dedup_by(|a, b| a.page == b.page && a.raw == b.raw);
    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_VISA: &str = "4111111111111111";
    const VALID_MC: &str = "5500005555555559";

    #[test]
    fn test_luhn() {
        assert!(luhn_valid(VALID_VISA));
        assert!(luhn_valid(VALID_MC));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid(""));
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask_pan(VALID_VISA), "**** **** **** 1111");
        assert_eq!(mask_pan("4111111111111"), "**** **** **** 1");
    }

    #[test]
    fn test_text_layer_hit() {
        let spans = vec![TextSpan::text_layer("Card: 4111 1111 1111 1111 exp 12/28", 0)];
        let hits = detect_pans(&spans, &PanOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw, VALID_VISA);
        assert_eq!(hits[0].masked, "**** **** **** 1111");
        assert_eq!(hits[0].severity, Severity::Hit);
        assert_eq!(hits[0].confidence, 1.0);
        assert_eq!(hits[0].validators, vec!["luhn"]);
    }

    #[test]
    fn test_text_layer_luhn_failure_is_dropped() {
        let spans = vec![TextSpan::text_layer("ref 4111111111111112", 0)];
        assert!(detect_pans(&spans, &PanOptions::default()).is_empty());
    }

    #[test]
    fn test_confusables_are_folded() {
        // 5500005555555559 with OCR letter substitutions.
        let spans = vec![TextSpan::ocr(
            "SS0000SSSSSSSSS9",
            BBox::new(0.0, 0.0, 100.0, 10.0),
            0,
            0.9,
        )];
        let hits = detect_pans(&spans, &PanOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw, VALID_MC);
        assert_eq!(hits[0].severity, Severity::Hit);
    }

    #[test]
    fn test_masked_values_are_never_redetected() {
        let spans = vec![TextSpan::text_layer("**** **** **** 1111", 0)];
        assert!(detect_pans(&spans, &PanOptions::default()).is_empty());
    }

    #[test]
    fn test_low_confidence_luhn_failure_becomes_suspicion() {
        let spans = vec![TextSpan::ocr(
            "4111111111111112",
            BBox::new(0.0, 0.0, 100.0, 10.0),
            0,
            0.4,
        )];
        let hits = detect_pans(&spans, &PanOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].severity, Severity::Suspicion);
        assert_eq!(hits[0].validators, vec!["pan_shape"]);
    }

    #[test]
    fn test_confident_luhn_failure_is_dropped() {
        let spans = vec![TextSpan::ocr(
            "4111111111111112",
            BBox::new(0.0, 0.0, 100.0, 10.0),
            0,
            0.95,
        )];
        assert!(detect_pans(&spans, &PanOptions::default()).is_empty());
    }

    #[test]
    fn test_embedded_longer_run_is_not_partially_matched() {
        let spans = vec![TextSpan::text_layer("12344111111111111111", 0)];
        assert!(detect_pans(&spans, &PanOptions::default()).is_empty());
    }

    #[test]
    fn test_stitches_embossed_groups() {
        let groups = ["4111", "1111", "1111", "1111"];
        let spans: Vec<TextSpan> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                let x0 = 50.0 + i as f64 * 70.0;
                TextSpan::ocr(*g, BBox::new(x0, 100.0, x0 + 50.0, 120.0), 0, 0.85)
            })
            .collect();
        let hits = detect_pans(&spans, &PanOptions::default());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw, VALID_VISA);
        assert!(hits[0].validators.contains(&"stitched".to_string()));
        // Union box spans all four groups.
        assert_eq!(hits[0].bbox.x0, 50.0);
        assert_eq!(hits[0].bbox.x1, 50.0 + 3.0 * 70.0 + 50.0);
    }

    #[test]
    fn test_stitch_respects_gap_limit() {
        let groups = ["4111", "1111", "1111", "1111"];
        let spans: Vec<TextSpan> = groups
            .iter()
            .enumerate()
            .map(|(i, g)| {
                // 150pt gaps: these are separate numbers, not one card.
                let x0 = 50.0 + i as f64 * 200.0;
                TextSpan::ocr(*g, BBox::new(x0, 100.0, x0 + 50.0, 120.0), 0, 0.85)
            })
            .collect();
        assert!(detect_pans(&spans, &PanOptions::default()).is_empty());
    }

    #[test]
    fn test_duplicate_on_same_page_reported_once() {
        let spans = vec![
            TextSpan::text_layer("4111 1111 1111 1111", 0),
            TextSpan::text_layer("copy: 4111 1111 1111 1111", 0),
        ];
        let hits = detect_pans(&spans, &PanOptions::default());
        assert_eq!(hits.len(), 1);
    }
}
