//! The backend trait seam.
//!
//! Engines are opaque collaborators reached through subprocesses. The
//! pipeline only sees this trait, so tests can substitute deterministic
//! fakes for the real engines.

use std::path::Path;

use crate::ocr::types::{BackendKind, OcrOutput, OcrRequest};

/// Three-way result of one backend call.
///
/// `Unavailable` is an expected condition (engine not installed on this
/// host), distinct from `Failed` (engine present but the call went wrong).
/// The selector skips the former silently and logs the latter; neither
/// aborts the chain.
#[derive(Debug)]
pub enum BackendOutcome {
    Success(OcrOutput),
    Unavailable,
    Failed(String),
}

/// One OCR engine.
pub trait OcrBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Cheap availability probe, called before every attempt. Must not
    /// error; an engine that cannot answer is unavailable.
    fn is_available(&self) -> bool;

    /// Recognize text in one page image. Never panics; anything that goes
    /// wrong inside the engine comes back as [`BackendOutcome::Failed`].
    fn recognize(&self, image: &Path, request: &OcrRequest) -> BackendOutcome;
}
