//! Tesseract CLI adapter.
//!
//! Drives the `tesseract` binary in TSV output mode and converts word rows
//! into [`OcrWord`]s. This is the baseline engine: slowest of the chain but
//! installable everywhere, so it sits last in the fallback order.

use std::path::Path;
use std::process::Command;

use crate::ocr::backend::{BackendOutcome, OcrBackend};
use crate::ocr::binary_on_path;
use crate::ocr::types::{BackendKind, OcrOutput, OcrRequest, OcrWord};
use crate::types::BBox;

const DIGITS_WHITELIST: &str = "tessedit_char_whitelist=0123456789";

pub struct TesseractBackend {
    binary: String,
}

impl TesseractBackend {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrBackend for TesseractBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tesseract
    }

    fn is_available(&self) -> bool {
        binary_on_path(&self.binary)
    }

    fn recognize(&self, image: &Path, request: &OcrRequest) -> BackendOutcome {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(image)
            .arg("stdout")
            .args(["--psm", "6"])
            .args(["-l", &request.language]);
        if request.digits_only {
            cmd.args(["-c", DIGITS_WHITELIST]);
        }
        cmd.arg("tsv");

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
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let words = parse_tsv(&stdout);
        BackendOutcome::Success(OcrOutput::from_words(BackendKind::Tesseract, words))
    }
}

/// Parse Tesseract's TSV output. Word rows are level 5 with a non-negative
/// confidence; everything else (page/block/line rows, the header) is layout
/// scaffolding we drop.
fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();
    for line in tsv.lines().skip(1) {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let (Ok(left), Ok(top), Ok(width), Ok(height), Ok(conf)) = (
            cols[6].parse::<f64>(),
            cols[7].parse::<f64>(),
            cols[8].parse::<f64>(),
            cols[9].parse::<f64>(),
            cols[10].parse::<f64>(),
        ) else {
            continue;
        };
        let text = cols[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }
        words.push(OcrWord {
            text: text.to_string(),
            bbox: BBox::new(left, top, left + width, top + height),
            confidence: (conf / 100.0).clamp(0.0, 1.0),
        });
    }
    words
}
