//! recipe-scan - text extraction from photographed recipe pages
//!
//! A photo goes through normalization (binarize, deskew, crop), block
//! segmentation, two-profile OCR and a lexical acceptance filter. What comes
//! out is a list of `(Classification, text)` pairs for the regions worth
//! keeping; turning those into structured records is up to the caller.

pub mod analysis;
pub mod app;
pub mod capture;
pub mod config;
pub mod error;
pub mod storage;
pub mod vision;

pub use analysis::{AcceptanceDecision, Classification, DiscardReason};
pub use app::{Extraction, ExtractionPipeline, RegionWarning};
pub use config::AppConfig;
pub use error::{EngineError, PipelineError};
pub use vision::{RecognitionResult, TextEngine};

/// Extract accepted text from an uploaded JPEG or PNG with default settings
/// and the Tesseract executable on `PATH`.
pub fn extract(
    bytes: &[u8],
    extension: &str,
) -> Result<Vec<(Classification, String)>, PipelineError> {
    let pipeline = ExtractionPipeline::with_tesseract(AppConfig::default())?;
    Ok(pipeline.extract(bytes, extension)?.accepted())
}
