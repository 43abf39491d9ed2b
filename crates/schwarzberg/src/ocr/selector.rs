//! Backend selection and the sequential fallback chain.
//!
//! A run never dies because an engine is missing: unavailable backends are
//! skipped, failed calls are logged and skipped, and if the whole chain
//! comes up empty the extraction simply scores zero and the pipeline takes
//! its quality refusal. The only hard error here is asking for an explicit
//! backend that is not present, which is a caller mistake.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::{Result, SchwarzbergError};
use crate::ocr::backend::{BackendOutcome, OcrBackend};
use crate::ocr::types::{AttemptStatus, BackendAttempt, BackendKind, BackendMode, OcrOutput, OcrRequest};

/// Priority order for `auto` and `combo`. Apple first (best fidelity where
/// present), Paddle second, Tesseract as the baseline. EasyOCR only runs
/// when explicitly requested.
pub const FALLBACK_ORDER: [BackendKind; 3] =
    [BackendKind::Apple, BackendKind::Paddle, BackendKind::Tesseract];

/// Candidate backends for one mode, in attempt order.
pub fn candidate_order(mode: BackendMode) -> Vec<BackendKind> {
    match mode {
        BackendMode::Auto | BackendMode::Combo => FALLBACK_ORDER.to_vec(),
        BackendMode::Explicit(kind) => vec![kind],
    }
}

/// The installed set of engine adapters.
pub struct BackendSet {
    backends: Vec<Box<dyn OcrBackend>>,
}

impl BackendSet {
    pub fn new(backends: Vec<Box<dyn OcrBackend>>) -> Self {
        Self { backends }
    }

    pub fn get(&self, kind: BackendKind) -> Option<&dyn OcrBackend> {
        self.backends
            .iter()
            .find(|b| b.kind() == kind)
            .map(|b| b.as_ref())
    }
}

/// What one pass over the chain produced.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Accepted reading, if any backend produced one.
    pub output: Option<OcrOutput>,
    /// Every attempted backend with its outcome, in attempt order. The
    /// order is the selector's candidate order, never reordered.
    pub attempts: Vec<BackendAttempt>,
}

/// Run the fallback chain over one page image.
///
/// `acceptance_floor` only matters in combo mode: a successful reading below
/// the floor is kept as the best-so-far but the chain continues; auto stops
/// at the first success regardless of its confidence.
pub fn run_chain(
    set: &BackendSet,
    mode: BackendMode,
    image: &Path,
    request: &OcrRequest,
    acceptance_floor: f64,
) -> Result<ChainOutcome> {
    let mut attempts = Vec::new();
    let mut best: Option<OcrOutput> = None;

    for kind in candidate_order(mode) {
        let backend = set.get(kind);
        let available = backend.map(|b| b.is_available()).unwrap_or(false);
        if !available {
            attempts.push(BackendAttempt {
                backend: kind,
                status: AttemptStatus::Unavailable,
                confidence: None,
                detail: None,
            });
            if let BackendMode::Explicit(_) = mode {
                return Err(SchwarzbergError::validation(format!(
                    "requested OCR backend '{kind}' is not available on this host"
                )));
            }
            debug!(backend = %kind, "backend unavailable, moving on");
            continue;
        }
        let backend = backend.ok_or_else(|| {
            SchwarzbergError::ocr(format!("backend '{kind}' vanished mid-chain"))
        })?;

        match backend.recognize(image, request) {
            BackendOutcome::Success(output) => {
                let confidence = output.mean_confidence;
                attempts.push(BackendAttempt {
                    backend: kind,
                    status: AttemptStatus::Success,
                    confidence: Some(confidence),
                    detail: None,
                });
                debug!(backend = %kind, confidence, "backend succeeded");
                match mode {
                    BackendMode::Auto | BackendMode::Explicit(_) => {
                        return Ok(ChainOutcome {
                            output: Some(output),
                            attempts,
                        });
                    }
                    BackendMode::Combo => {
                        if confidence >= acceptance_floor {
                            return Ok(ChainOutcome {
                                output: Some(output),
                                attempts,
                            });
                        }
                        let better = best
                            .as_ref()
                            .map(|b| confidence > b.mean_confidence)
                            .unwrap_or(true);
                        if better {
                            best = Some(output);
                        }
                    }
                }
            }
            BackendOutcome::Unavailable => {
                // The probe passed but the call itself reported absence;
                // treat it the same as a failed probe.
                attempts.push(BackendAttempt {
                    backend: kind,
                    status: AttemptStatus::Unavailable,
                    confidence: None,
                    detail: None,
                });
                if let BackendMode::Explicit(_) = mode {
                    return Err(SchwarzbergError::validation(format!(
                        "requested OCR backend '{kind}' is not available on this host"
                    )));
                }
            }
            BackendOutcome::Failed(detail) => {
                warn!(backend = %kind, %detail, "backend call failed");
                attempts.push(BackendAttempt {
                    backend: kind,
                    status: AttemptStatus::Failed,
                    confidence: None,
                    detail: Some(detail.clone()),
                });
                if let BackendMode::Explicit(_) = mode {
                    return Err(SchwarzbergError::ocr(format!(
                        "OCR backend '{kind}' failed: {detail}"
                    )));
                }
            }
        }
    }

    // Combo exhausted: fall back to the best sub-floor reading, if any.
    Ok(ChainOutcome {
        output: best,
        attempts,
    })
}
