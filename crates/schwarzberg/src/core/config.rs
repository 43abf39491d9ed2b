//! Run configuration and the pack registry.
//!
//! A *pack* bundles the policy for one document class: which detectors run,
//! which extraction path feeds them, and the thresholds the gates use.
//! Three packs ship built in; a TOML file can override them or add more.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SchwarzbergError};
use crate::extract::ExtractorMode;
use crate::render::DEFAULT_REDACTED_SUFFIX;
use crate::types::DetectionKind;

pub const DEFAULT_TEXT_QUALITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_OCR_QUALITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_STRICT_MIN_CONFIDENCE: f64 = 0.75;

/// Policy bundle for one document class.
#[derive(Debug, Clone, Deserialize)]
pub struct PackConfig {
    pub id: String,
    pub detectors: Vec<DetectionKind>,
    #[serde(default = "default_extractor_mode")]
    pub extractor_mode: ExtractorMode,
    #[serde(default = "default_text_quality")]
    pub text_quality_threshold: f64,
    #[serde(default = "default_ocr_quality")]
    pub ocr_quality_threshold: f64,
    #[serde(default = "default_strict_confidence")]
    pub strict_min_confidence: f64,
    /// Re-extract the redacted artifact and fail the run if any strict hit
    /// survives. Only meaningful for PDF inputs with a text layer.
    #[serde(default)]
    pub verify_after_redact: bool,
}

fn default_extractor_mode() -> ExtractorMode {
    ExtractorMode::Auto
}

fn default_text_quality() -> f64 {
    DEFAULT_TEXT_QUALITY_THRESHOLD
}

fn default_ocr_quality() -> f64 {
    DEFAULT_OCR_QUALITY_THRESHOLD
}

fn default_strict_confidence() -> f64 {
    DEFAULT_STRICT_MIN_CONFIDENCE
}

/// Top-level configuration. Every field has a default, so an empty file
/// (or no file at all) yields a working setup.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_suffix")]
    pub output_suffix: String,
    /// Extra or overriding packs; merged over the built-ins by id.
    #[serde(default)]
    pub packs: Vec<PackConfig>,
}

fn default_suffix() -> String {
    DEFAULT_REDACTED_SUFFIX.to_string()
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            output_suffix: default_suffix(),
            packs: Vec::new(),
        }
    }
}

impl RedactionConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|err| SchwarzbergError::Validation {
            message: format!("bad config file {}", path.display()),
            source: Some(Box::new(err)),
        })
    }

    /// Built-in packs with this config's overrides merged on top.
    pub fn registry(&self) -> PackRegistry {
        let mut packs: BTreeMap<String, PackConfig> = builtin_packs()
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();
        for pack in &self.packs {
            packs.insert(pack.id.clone(), pack.clone());
        }
        PackRegistry { packs }
    }
}

fn builtin_packs() -> Vec<PackConfig> {
    vec![
        // Bank statements and similar: text layer first, OCR fallback.
        PackConfig {
            id: "global.pci_lite.v1".to_string(),
            detectors: vec![DetectionKind::Pan],
            extractor_mode: ExtractorMode::Auto,
            text_quality_threshold: DEFAULT_TEXT_QUALITY_THRESHOLD,
            ocr_quality_threshold: DEFAULT_OCR_QUALITY_THRESHOLD,
            strict_min_confidence: DEFAULT_STRICT_MIN_CONFIDENCE,
            verify_after_redact: true,
        },
        // Photographs of payment cards: OCR only, nothing to verify in the
        // output's (empty) text layer.
        PackConfig {
            id: "global.card_photo.v1".to_string(),
            detectors: vec![DetectionKind::Pan],
            extractor_mode: ExtractorMode::Ocr,
            text_quality_threshold: DEFAULT_TEXT_QUALITY_THRESHOLD,
            ocr_quality_threshold: DEFAULT_OCR_QUALITY_THRESHOLD,
            strict_min_confidence: DEFAULT_STRICT_MIN_CONFIDENCE,
            verify_after_redact: false,
        },
        // Identity documents: MRZ drives redaction, loose ID numbers only
        // flag for review.
        PackConfig {
            id: "global.id_photo.v1".to_string(),
            detectors: vec![DetectionKind::Mrz, DetectionKind::IdNumber],
            extractor_mode: ExtractorMode::Ocr,
            text_quality_threshold: DEFAULT_TEXT_QUALITY_THRESHOLD,
            ocr_quality_threshold: DEFAULT_OCR_QUALITY_THRESHOLD,
            strict_min_confidence: DEFAULT_STRICT_MIN_CONFIDENCE,
            verify_after_redact: false,
        },
    ]
}

/// Resolved set of available packs.
#[derive(Debug)]
pub struct PackRegistry {
    packs: BTreeMap<String, PackConfig>,
}

impl PackRegistry {
    /// Unknown pack ids are a caller error, surfaced before any file is
    /// touched.
    pub fn get(&self, id: &str) -> Result<&PackConfig> {
        self.packs.get(id).ok_or_else(|| {
            SchwarzbergError::validation(format!(
                "unknown pack '{id}' (available: {})",
                self.ids().join(", ")
            ))
        })
    }

    pub fn ids(&self) -> Vec<String> {
        self.packs.keys().cloned().collect()
    }
}
