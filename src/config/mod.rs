//! Pipeline Configuration
//!
//! Tunable thresholds and kernel sizes stored in TOML format. One `AppConfig`
//! is handed to the pipeline per invocation and never mutated by it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Page normalization settings
    pub normalizer: NormalizerSettings,
    /// Region segmentation settings
    pub segmenter: SegmenterSettings,
    /// OCR engine settings
    pub recognizer: RecognizerSettings,
    /// Accept/reject policy
    pub acceptance: AcceptanceSettings,
    /// Performance settings
    pub performance: PerformanceConfig,
}

/// Normalizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSettings {
    /// Radius of the dilate/erode/close kernels in the noise pass (0 = 1x1)
    pub noise_radius: u8,
    /// Radius of the median filter (1 = 3x3)
    pub median_radius: u32,
    /// Radius of the stroke-thickening dilation (1 = 3x3)
    pub thicken_radius: u8,
    /// Skew angles below this (degrees) are left uncorrected
    pub min_skew_degrees: f32,
    /// Pixels above this level are white again after interpolated rotation
    pub rebinarize_level: u8,
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            noise_radius: 0,
            median_radius: 1,
            thicken_radius: 1,
            min_skew_degrees: 0.05,
            rebinarize_level: 127,
        }
    }
}

/// Region segmenter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterSettings {
    /// Gaussian blur sigma applied before dilation
    pub blur_sigma: f32,
    /// Width of the merging kernel (words into lines)
    pub kernel_width: u32,
    /// Height of the merging kernel (lines into paragraphs)
    pub kernel_height: u32,
    /// Minimum region width relative to the widest block on the page
    pub min_width_ratio: f32,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            blur_sigma: 1.5,
            kernel_width: 30,
            kernel_height: 5,
            min_width_ratio: 0.5,
        }
    }
}

/// Tesseract page segmentation / engine mode pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Page segmentation mode (`--psm`)
    pub psm: u8,
    /// OCR engine mode (`--oem`), 1 = LSTM only
    pub oem: u8,
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerSettings {
    /// Tesseract executable (name on PATH or absolute path)
    pub tesseract_path: String,
    /// Optional tessdata directory
    pub tessdata_dir: Option<String>,
    /// Recognition language
    pub language: String,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Profile for sparse, irregular text (ingredient lists)
    pub sparse: ProfileConfig,
    /// Profile for a single uniform block (instruction paragraphs)
    pub block: ProfileConfig,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self {
            tesseract_path: "tesseract".to_string(),
            tessdata_dir: None,
            language: "eng".to_string(),
            timeout_secs: 30,
            sparse: ProfileConfig { psm: 11, oem: 1 },
            block: ProfileConfig { psm: 6, oem: 1 },
        }
    }
}

impl RecognizerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Accept/reject policy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceSettings {
    /// Mean token confidence an ingredients block must exceed (0 - 100)
    pub ingredients_threshold: f32,
    /// Mean token confidence an instructions block must exceed (0 - 100)
    pub instructions_threshold: f32,
    /// Glyphs marking a quantity, hence an ingredient line
    pub fraction_glyphs: Vec<String>,
    /// Words marking a cooking step
    pub instruction_cues: Vec<String>,
    /// Optional fuzzy word match cutoff for cues (0.0 - 1.0). Off by default:
    /// cues then only match as case-insensitive substrings.
    pub cue_similarity: Option<f64>,
}

impl Default for AcceptanceSettings {
    fn default() -> Self {
        Self {
            ingredients_threshold: 50.0,
            instructions_threshold: 50.0,
            fraction_glyphs: vec!["¼".to_string(), "½".to_string()],
            instruction_cues: ["prepare", "preheat", "assemble", "bowls"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            cue_similarity: None,
        }
    }
}

/// Performance-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker threads for region recognition (1 = sequential)
    pub workers: usize,
    /// Image decode timeout in seconds
    pub decode_timeout_secs: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            decode_timeout_secs: 10,
        }
    }
}

impl PerformanceConfig {
    pub fn decode_timeout(&self) -> Duration {
        Duration::from_secs(self.decode_timeout_secs)
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmenter;
        if seg.kernel_width == 0 || seg.kernel_height == 0 {
            return Err(ConfigError::invalid("segmenter.kernel", "kernel sides must be positive"));
        }
        if !(seg.min_width_ratio > 0.0 && seg.min_width_ratio < 1.0) {
            return Err(ConfigError::invalid("segmenter.min_width_ratio", "must lie in (0, 1)"));
        }
        if !(seg.blur_sigma > 0.0 && seg.blur_sigma.is_finite()) {
            return Err(ConfigError::invalid("segmenter.blur_sigma", "must be positive and finite"));
        }

        let min_skew = self.normalizer.min_skew_degrees;
        if !(min_skew >= 0.0 && min_skew.is_finite()) {
            return Err(ConfigError::invalid(
                "normalizer.min_skew_degrees",
                "must be non-negative and finite",
            ));
        }

        let acc = &self.acceptance;
        for (key, value) in [
            ("acceptance.ingredients_threshold", acc.ingredients_threshold),
            ("acceptance.instructions_threshold", acc.instructions_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::invalid(key, "must lie in [0, 100]"));
            }
        }
        if acc.fraction_glyphs.is_empty() && acc.instruction_cues.is_empty() {
            return Err(ConfigError::invalid(
                "acceptance",
                "at least one fraction glyph or instruction cue is required",
            ));
        }
        if let Some(similarity) = acc.cue_similarity {
            if !(0.0..=1.0).contains(&similarity) {
                return Err(ConfigError::invalid("acceptance.cue_similarity", "must lie in [0, 1]"));
            }
        }

        if self.performance.workers == 0 {
            return Err(ConfigError::invalid("performance.workers", "must be at least 1"));
        }
        if self.recognizer.timeout_secs == 0 || self.performance.decode_timeout_secs == 0 {
            return Err(ConfigError::invalid("timeouts", "must be at least one second"));
        }

        Ok(())
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
