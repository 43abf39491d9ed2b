//! Shared OCR types: backend identifiers, selection modes, and results.

use serde::{Deserialize, Serialize};

use crate::types::BBox;

/// Environment variable overriding the backend selection mode.
pub const BACKEND_MODE_ENV: &str = "SCHWARZBERG_OCR_BACKEND";

/// Identifies one OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Apple Vision framework (macOS only, highest local fidelity).
    Apple,
    /// PaddleOCR helper process.
    Paddle,
    /// EasyOCR helper process.
    Easy,
    /// Tesseract CLI, the universally-available baseline.
    Tesseract,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Apple => "apple",
            BackendKind::Paddle => "paddle",
            BackendKind::Easy => "easy",
            BackendKind::Tesseract => "tesseract",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "apple" => Some(BackendKind::Apple),
            "paddle" => Some(BackendKind::Paddle),
            "easy" => Some(BackendKind::Easy),
            "tesseract" => Some(BackendKind::Tesseract),
            _ => None,
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested backend selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Fixed priority order, first available engine wins.
    Auto,
    /// Chain through all candidates, keeping the best reading even past
    /// low-confidence results.
    Combo,
    /// Exactly this engine; unavailability is a caller error.
    Explicit(BackendKind),
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Auto => "auto",
            BackendMode::Combo => "combo",
            BackendMode::Explicit(kind) => kind.as_str(),
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "auto" => Some(BackendMode::Auto),
            "combo" => Some(BackendMode::Combo),
            other => BackendKind::parse(other).map(BackendMode::Explicit),
        }
    }

    /// Resolve the effective mode: explicit parameter beats the
    /// `SCHWARZBERG_OCR_BACKEND` environment override, which beats `auto`.
    /// Unrecognized values fall back to `auto` rather than failing the run.
    pub fn resolve(explicit: Option<&str>) -> Self {
        let env_mode = std::env::var(BACKEND_MODE_ENV).ok();
        let raw = explicit
            .map(str::to_owned)
            .or(env_mode)
            .unwrap_or_else(|| "auto".to_string());
        Self::parse(&raw.to_lowercase()).unwrap_or(BackendMode::Auto)
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options handed to a backend.
#[derive(Debug, Clone)]
pub struct OcrRequest {
    /// Engine language hint (Tesseract-style code, e.g. `eng`).
    pub language: String,
    /// Restrict recognition to digits; used for PAN-bearing regions.
    pub digits_only: bool,
}

impl Default for OcrRequest {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            digits_only: false,
        }
    }
}

/// One recognized word with geometry and confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub bbox: BBox,
    /// Confidence in [0,1].
    pub confidence: f64,
}

/// Successful output of one backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrOutput {
    pub text: String,
    pub words: Vec<OcrWord>,
    /// Mean word confidence in [0,1]; 0.0 when nothing was recognized.
    pub mean_confidence: f64,
    pub backend: BackendKind,
}

impl OcrOutput {
    pub fn empty(backend: BackendKind) -> Self {
        Self {
            text: String::new(),
            words: Vec::new(),
            mean_confidence: 0.0,
            backend,
        }
    }

    pub fn from_words(backend: BackendKind, words: Vec<OcrWord>) -> Self {
        let text = words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let mean_confidence = if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64
        };
        Self {
            text,
            words,
            mean_confidence,
            backend,
        }
    }
}

/// How one attempted backend call ended, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Unavailable,
    Failed,
}

/// One entry of the per-run backend audit trail. The recorded order is
/// exactly the order the selector yielded candidates, unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendAttempt {
    pub backend: BackendKind,
    pub status: AttemptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_roundtrip() {
        for kind in [
            BackendKind::Apple,
            BackendKind::Paddle,
            BackendKind::Easy,
            BackendKind::Tesseract,
        ] {
            assert_eq!(BackendKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(BackendKind::parse("vision"), None);
    }

    #[test]
    fn test_mode_resolution_precedence() {
        // Explicit beats everything, including garbage in the environment.
        std::env::remove_var(BACKEND_MODE_ENV);
        assert_eq!(BackendMode::resolve(None), BackendMode::Auto);
        assert_eq!(
            BackendMode::resolve(Some("tesseract")),
            BackendMode::Explicit(BackendKind::Tesseract)
        );
        assert_eq!(BackendMode::resolve(Some("COMBO")), BackendMode::Combo);
        assert_eq!(BackendMode::resolve(Some("unknown")), BackendMode::Auto);

        std::env::set_var(BACKEND_MODE_ENV, "paddle");
        assert_eq!(
            BackendMode::resolve(None),
            BackendMode::Explicit(BackendKind::Paddle)
        );
        assert_eq!(
            BackendMode::resolve(Some("easy")),
            BackendMode::Explicit(BackendKind::Easy)
        );
        std::env::remove_var(BACKEND_MODE_ENV);
    }

    #[test]
    fn test_output_from_words_averages_confidence() {
        let words = vec![
            OcrWord {
                text: "4111".to_string(),
                bbox: BBox::default(),
                confidence: 0.9,
            },
            OcrWord {
                text: "1111".to_string(),
                bbox: BBox::default(),
                confidence: 0.7,
            },
        ];
        let out = OcrOutput::from_words(BackendKind::Tesseract, words);
        assert_eq!(out.text, "4111 1111");
        assert!((out.mean_confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_empty_output_has_zero_confidence() {
        let out = OcrOutput::empty(BackendKind::Paddle);
        assert_eq!(out.mean_confidence, 0.0);
        assert!(out.words.is_empty());
    }
}
