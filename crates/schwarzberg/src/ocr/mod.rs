//! OCR engine adapters and the fallback selector.
//!
//! Engines live outside the process (Tesseract CLI, platform helper
//! binaries). Each adapter implements [`OcrBackend`]; the selector walks
//! them in priority order and records an audit trail of every attempt.

mod backend;
mod external;
mod selector;
mod tesseract;
mod types;

pub use backend::{BackendOutcome, OcrBackend};
pub use external::HelperBackend;
pub use selector::{candidate_order, run_chain, BackendSet, ChainOutcome, FALLBACK_ORDER};
pub use tesseract::TesseractBackend;
pub use types::{
    AttemptStatus, BackendAttempt, BackendKind, BackendMode, OcrOutput, OcrRequest, OcrWord,
    BACKEND_MODE_ENV,
};

/// All engine adapters this build knows how to drive. Availability is
/// probed per attempt, not here; a host without any of these still gets a
/// working (if OCR-less) pipeline.
pub fn default_backend_set() -> BackendSet {
    BackendSet::new(vec![
        Box::new(HelperBackend::apple()),
        Box::new(HelperBackend::paddle()),
        Box::new(HelperBackend::easy()),
        Box::new(TesseractBackend::default()),
    ])
}

/// True when `name` resolves to an executable on `PATH`.
pub(crate) fn binary_on_path(name: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(name);
        candidate.is_file()
    })
}
