//! Schwarzberg: a redaction decision engine for documents carrying
//! regulated identity and payment data.
//!
//! Every run over a document ends in exactly one of three terminal states:
//! `processed` (a redacted artifact exists), `skipped` (a documented policy
//! refusal, nothing written) or `error` (an operational fault). Candidate
//! text comes from the PDF's own text layer or from a prioritized chain of
//! OCR engines; detections must pass structural validation and a
//! confidence gate before any ink is spent.
//!
//! # Example
//!
//! ```no_run
//! use schwarzberg::core::{Pipeline, RedactionConfig, RunRequest};
//! use schwarzberg::extract::PdftoppmRasterizer;
//! use schwarzberg::ocr::{default_backend_set, BackendMode};
//! use schwarzberg::render::PdfRenderer;
//!
//! # fn main() -> schwarzberg::Result<()> {
//! let config = RedactionConfig::default();
//! let backends = default_backend_set();
//! let rasterizer = PdftoppmRasterizer::default();
//! let renderer = PdfRenderer;
//! let pipeline = Pipeline::new(&config, &backends, &rasterizer, &renderer);
//!
//! let outcome = pipeline.run_redaction(&RunRequest {
//!     input: "statements/Bank1.pdf".into(),
//!     pack_id: "global.pci_lite.v1".to_string(),
//!     backend_mode: BackendMode::resolve(None),
//!     output_dir: "out".into(),
//! })?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod core;
pub mod detect;
pub mod error;
pub mod extract;
pub mod ocr;
pub mod render;
pub mod types;

pub use error::{Result, SchwarzbergError};
pub use types::{
    BBox, DecisionPayload, Detection, DetectionKind, RedactionOutcome, RunStatus, Severity,
    SkipReason, SpanSource, TextSpan,
};
