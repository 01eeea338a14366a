//! OCR (Optical Character Recognition) module
//!
//! Runs a text engine over region images under two named profiles. Which
//! profile's output to trust is decided later by the acceptance filter.

use crossbeam_channel::{bounded, RecvTimeoutError};
use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{ProfileConfig, RecognizerSettings};
use crate::error::EngineError;

use super::RegionImage;

/// Named OCR layout profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Sparse, irregular text such as ingredient lists
    Sparse,
    /// One uniform block such as an instruction paragraph
    Block,
}

/// Text recognized in one region under one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecognitionResult {
    /// Recognized text, lines separated by `\n`
    pub text: String,
    /// One confidence (0 - 100) per recognized token
    pub token_confidences: Vec<f32>,
}

impl RecognitionResult {
    pub fn new(text: impl Into<String>, token_confidences: Vec<f32>) -> Self {
        Self {
            text: text.into(),
            token_confidences,
        }
    }

    /// Mean token confidence, `None` when no token was recognized
    pub fn mean_confidence(&self) -> Option<f32> {
        if self.token_confidences.is_empty() {
            return None;
        }
        let sum: f32 = self.token_confidences.iter().sum();
        Some(sum / self.token_confidences.len() as f32)
    }

    pub fn token_count(&self) -> usize {
        self.token_confidences.len()
    }
}

/// A text recognition backend.
///
/// Implementations must be callable from several worker threads at once.
pub trait TextEngine: Send + Sync {
    /// Recognize `image` using the given layout profile
    fn recognize_text(
        &self,
        image: &GrayImage,
        profile: &ProfileConfig,
    ) -> Result<RecognitionResult, EngineError>;
}

/// Runs the engine per region and profile, bounded by a timeout
pub struct Recognizer {
    engine: Arc<dyn TextEngine>,
    sparse: ProfileConfig,
    block: ProfileConfig,
    timeout: Duration,
}

impl Recognizer {
    pub fn new(engine: Arc<dyn TextEngine>, settings: &RecognizerSettings) -> Self {
        Self {
            engine,
            sparse: settings.sparse,
            block: settings.block,
            timeout: settings.timeout(),
        }
    }

    /// Engine configuration for a profile
    pub fn profile_config(&self, profile: Profile) -> ProfileConfig {
        match profile {
            Profile::Sparse => self.sparse,
            Profile::Block => self.block,
        }
    }

    /// Recognize one region.
    ///
    /// The engine runs on its own thread; if it has not answered within the
    /// timeout the call fails with `EngineError::Timeout` and the late answer
    /// is dropped.
    pub fn recognize(
        &self,
        region: &RegionImage,
        profile: Profile,
    ) -> Result<RecognitionResult, EngineError> {
        let start = Instant::now();
        let config = self.profile_config(profile);
        let engine = Arc::clone(&self.engine);
        let image = region.image.clone();
        let (tx, rx) = bounded(1);

        std::thread::Builder::new()
            .name(format!("ocr-region-{}", region.index))
            .spawn(move || {
                let _ = tx.send(engine.recognize_text(&image, &config));
            })?;

        let result = match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Output(
                "recognition thread exited without a result".to_string(),
            )),
        }?;

        debug!(
            "Region {} ({:?}): {} tokens, mean confidence {:?} in {:?}",
            region.index,
            profile,
            result.token_count(),
            result.mean_confidence(),
            start.elapsed()
        );
        Ok(result)
    }
}
