//! Helper-process adapters for the Apple Vision, PaddleOCR and EasyOCR
//! engines.
//!
//! These engines run in their own processes behind a tiny line protocol:
//! the helper takes an image path and prints one JSON object per recognized
//! word. The adapter never looks inside the engine; a missing helper binary
//! just means the backend is unavailable on this host.

use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::ocr::backend::{BackendOutcome, OcrBackend};
use crate::ocr::binary_on_path;
use crate::ocr::types::{BackendKind, OcrOutput, OcrRequest, OcrWord};
use crate::types::BBox;

/// One word as emitted by a helper process.
#[derive(Debug, Deserialize)]
struct HelperWord {
    text: String,
    /// [x0, y0, x1, y1] in image pixels.
    bbox: [f64; 4],
    confidence: f64,
}

pub struct HelperBackend {
    kind: BackendKind,
    command: String,
}

impl HelperBackend {
    pub fn new(kind: BackendKind, command: impl Into<String>) -> Self {
        Self {
            kind,
            command: command.into(),
        }
    }

    /// Apple Vision, via the bundled Swift helper. macOS only.
    pub fn apple() -> Self {
        Self::new(BackendKind::Apple, "vision-ocr-helper")
    }

    pub fn paddle() -> Self {
        Self::new(BackendKind::Paddle, "paddle-ocr-helper")
    }

    pub fn easy() -> Self {
        Self::new(BackendKind::Easy, "easy-ocr-helper")
    }
}

impl OcrBackend for HelperBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn is_available(&self) -> bool {
        if self.kind == BackendKind::Apple && !cfg!(target_os = "macos") {
            return false;
        }
        binary_on_path(&self.command)
    }

    fn recognize(&self, image: &Path, request: &OcrRequest) -> BackendOutcome {
        let mut cmd = Command::new(&self.command);
        cmd.arg(image).args(["--lang", &request.language]);
        if request.digits_only {
            cmd.arg("--digits");
        }

        let output = match cmd.output() {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return BackendOutcome::Unavailable;
            }
            Err(err) => return BackendOutcome::Failed(err.to_string()),
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return BackendOutcome::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_word_lines(&stdout) {
            Ok(words) => BackendOutcome::Success(OcrOutput::from_words(self.kind, words)),
            Err(err) => BackendOutcome::Failed(format!("bad helper output: {err}")),
        }
    }
}

fn parse_word_lines(stdout: &str) -> serde_json::Result<Vec<OcrWord>> {
    let mut words = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let word: HelperWord = serde_json::from_str(line)?;
        words.push(OcrWord {
            text: word.text,
            bbox: BBox::new(word.bbox[0], word.bbox[1], word.bbox[2], word.bbox[3]),
            confidence: word.confidence.clamp(0.0, 1.0),
        });
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_lines() {
        let stdout = r#"
{"text":"5500","bbox":[12.0,30.0,64.0,52.0],"confidence":0.93}
{"text":"0000","bbox":[70.0,30.0,122.0,52.0],"confidence":0.88}
"#;
        let words = parse_word_lines(stdout).unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "5500");
        assert_eq!(words[1].bbox, BBox::new(70.0, 30.0, 122.0, 52.0));
    }

    #[test]
    fn test_parse_word_lines_rejects_malformed_json() {
        assert!(parse_word_lines("{\"text\":").is_err());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let stdout = r#"{"text":"x","bbox":[0,0,1,1],"confidence":1.7}"#;
        let words = parse_word_lines(stdout).unwrap();
        assert_eq!(words[0].confidence, 1.0);
    }
}
