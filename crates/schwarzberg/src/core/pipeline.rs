//! The decision engine.
//!
//! One linear traversal per document, three ways out:
//! * `Processed` — a redacted (or highlighted) artifact is on disk;
//! * `Skipped` — a documented policy refusal, nothing written;
//! * `Err` — an operational fault somewhere in the machinery.
//!
//! Refusals are first-class outcomes, not failures: a skipped document has
//! been *decided about*, and the reason travels with the decision.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::config::{PackConfig, RedactionConfig};
use crate::detect::{run_detectors, strict_filter};
use crate::error::{Result, SchwarzbergError};
use crate::extract::{
    extract_text_spans, Extractor, ExtractorVerdict, PageRasterizer, QualityThresholds,
};
use crate::ocr::{BackendMode, BackendSet};
use crate::render::{highlight_filename, redacted_filename, Renderer};
use crate::types::{Detection, RedactionOutcome, SkipReason};

/// One document to decide about.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub input: PathBuf,
    pub pack_id: String,
    pub backend_mode: BackendMode,
    pub output_dir: PathBuf,
}

/// Wires config and collaborators together for any number of runs.
pub struct Pipeline<'a> {
    config: &'a RedactionConfig,
    backends: &'a BackendSet,
    rasterizer: &'a dyn PageRasterizer,
    renderer: &'a dyn Renderer,
}

/// What extraction and detection produced, before any artifact work.
enum Gatekeeping {
    Refused(SkipReason),
    Ready {
        detections: Vec<Detection>,
        strict: Vec<Detection>,
    },
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RedactionConfig,
        backends: &'a BackendSet,
        rasterizer: &'a dyn PageRasterizer,
        renderer: &'a dyn Renderer,
    ) -> Self {
        Self {
            config,
            backends,
            rasterizer,
            renderer,
        }
    }

    /// Decide about one document and, when warranted, write the redacted
    /// artifact.
    pub fn run_redaction(&self, request: &RunRequest) -> Result<RedactionOutcome> {
        let pack = self.config.registry();
        let pack = pack.get(&request.pack_id)?.clone();
        let stem = input_stem(&request.input)?;

        match self.gate(request, &pack)? {
            Gatekeeping::Refused(reason) => {
                info!(pack = %pack.id, %reason, "skipping document");
                Ok(RedactionOutcome::Skipped { reason })
            }
            Gatekeeping::Ready { strict, .. } => {
                if strict.is_empty() {
                    info!(pack = %pack.id, "nothing redaction-grade found");
                    return Ok(RedactionOutcome::Skipped {
                        reason: SkipReason::NoPiiFound,
                    });
                }
                std::fs::create_dir_all(&request.output_dir)?;
                let output = request
                    .output_dir
                    .join(redacted_filename(&stem, &self.config.output_suffix));
                let applied = self.renderer.redact(&request.input, &strict, &output)?;
                ensure_artifact(&output)?;
                if pack.verify_after_redact {
                    self.verify_artifact(&output, &pack)?;
                }
                info!(pack = %pack.id, output = %output.display(), applied, "document processed");
                Ok(RedactionOutcome::Processed {
                    output_path: output,
                    redactions_applied: applied,
                })
            }
        }
    }

    /// Review variant: every detection (suspicions included) is marked but
    /// left legible, and the artifact is never verified against itself.
    pub fn run_highlight(&self, request: &RunRequest) -> Result<RedactionOutcome> {
        let pack = self.config.registry();
        let pack = pack.get(&request.pack_id)?.clone();
        let stem = input_stem(&request.input)?;

        match self.gate(request, &pack)? {
            Gatekeeping::Refused(reason) => {
                info!(pack = %pack.id, %reason, "skipping document");
                Ok(RedactionOutcome::Skipped { reason })
            }
            Gatekeeping::Ready { detections, .. } => {
                if detections.is_empty() {
                    return Ok(RedactionOutcome::Skipped {
                        reason: SkipReason::NoPiiFound,
                    });
                }
                std::fs::create_dir_all(&request.output_dir)?;
                let output = request.output_dir.join(highlight_filename(&stem));
                self.renderer
                    .highlight(&request.input, &detections, &output)?;
                ensure_artifact(&output)?;
                info!(pack = %pack.id, output = %output.display(), "review artifact written");
                Ok(RedactionOutcome::Processed {
                    output_path: output,
                    redactions_applied: detections.len(),
                })
            }
        }
    }

    fn gate(&self, request: &RunRequest, pack: &PackConfig) -> Result<Gatekeeping> {
        let extractor = Extractor::new(self.backends, self.rasterizer);
        let verdict = extractor.extract(
            &request.input,
            pack.extractor_mode,
            request.backend_mode,
            QualityThresholds {
                text: pack.text_quality_threshold,
                ocr: pack.ocr_quality_threshold,
            },
        )?;
        let extraction = match verdict {
            ExtractorVerdict::SubThreshold {
                reason,
                quality,
                extraction,
            } => {
                debug!(
                    quality,
                    attempts = extraction.attempts.len(),
                    "extraction below threshold"
                );
                return Ok(Gatekeeping::Refused(reason));
            }
            ExtractorVerdict::Usable(extraction) => extraction,
        };
        debug!(
            spans = extraction.spans.len(),
            quality = extraction.quality_score,
            source = ?extraction.source,
            "extraction usable"
        );

        let detections = run_detectors(&pack.detectors, &extraction.spans);
        let strict = strict_filter(detections.clone(), pack.strict_min_confidence)?;
        Ok(Gatekeeping::Ready { detections, strict })
    }

    /// Re-read the artifact's own text layer and make sure no strict hit
    /// survived. A surviving hit means the artifact lies about being
    /// redacted, which is worse than failing the run.
    fn verify_artifact(&self, output: &Path, pack: &PackConfig) -> Result<()> {
        let spans = extract_text_spans(output)?;
        let detections = run_detectors(&pack.detectors, &spans);
        let survivors = strict_filter(detections, pack.strict_min_confidence)?;
        if survivors.is_empty() {
            return Ok(());
        }
        warn!(
            survivors = survivors.len(),
            output = %output.display(),
            "redacted artifact still carries hits, withdrawing it"
        );
        if let Err(err) = std::fs::remove_file(output) {
            warn!(%err, "could not withdraw failed artifact");
        }
        Err(SchwarzbergError::ArtifactMissing(output.to_path_buf()))
    }
}

fn input_stem(input: &Path) -> Result<String> {
    input
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_owned)
        .ok_or_else(|| {
            SchwarzbergError::validation(format!("input has no usable name: {}", input.display()))
        })
}

fn ensure_artifact(output: &Path) -> Result<()> {
    if output.is_file() {
        Ok(())
    } else {
        Err(SchwarzbergError::ArtifactMissing(output.to_path_buf()))
    }
}

/// RAII guard for inputs staged into a scratch location (uploads copied to
/// a temp file). The staged file is deleted when the guard drops, whatever
/// the run decided, unless the caller persists it.
#[derive(Debug)]
pub struct ScopedInput {
    path: PathBuf,
    persist: bool,
}

impl ScopedInput {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            persist: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the staged file and hand its path back.
    pub fn persist(mut self) -> PathBuf {
        self.persist = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScopedInput {
    fn drop(&mut self) {
        if self.persist {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "scratch input removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "scratch input not removed"),
        }
    }
}
