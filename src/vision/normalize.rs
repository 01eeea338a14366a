//! Page normalization
//!
//! Grayscale, binarize, deskew and crop a page photo, then clean it up for
//! segmentation. The page itself (bright paper) is the dominant shape.

use image::{DynamicImage, GrayImage};
use tracing::debug;

use crate::config::NormalizerSettings;
use crate::error::{PipelineError, Stage};

use super::geometry::{dominant_outline, skew_angle};
use super::preprocess::{
    binarize, has_black, remove_noise, rotate_replicate, thicken_strokes, threshold_above,
    to_grayscale,
};
use super::{BoundingBox, PageImage};

/// Output of the normalizer
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    /// Binary, level, cropped page
    pub image: PageImage,
    /// Correction applied, in degrees
    pub skew_degrees: f32,
    /// Crop rectangle in the deskewed photo
    pub crop: BoundingBox,
    /// Otsu level picked for the photo
    pub threshold: u8,
}

/// Page normalizer
pub struct Normalizer {
    settings: NormalizerSettings,
}

impl Normalizer {
    pub fn new(settings: NormalizerSettings) -> Self {
        Self { settings }
    }

    /// Normalize a decoded photo
    pub fn normalize(&self, image: &DynamicImage) -> Result<NormalizedPage, PipelineError> {
        self.normalize_gray(&to_grayscale(image))
    }

    /// Normalize an already grayscale photo.
    ///
    /// Fails with `NoDominantRegionFound` when the binarized photo has no
    /// bright shape, or when the cropped page carries no dark pixel at all.
    pub fn normalize_gray(&self, gray: &GrayImage) -> Result<NormalizedPage, PipelineError> {
        let no_region = || PipelineError::NoDominantRegionFound {
            stage: Stage::Normalize,
        };

        let (binary, threshold) = binarize(gray);
        let page = dominant_outline(&binary).ok_or_else(no_region)?;
        let skew_degrees = skew_angle(&page.points);

        let level = self.deskew(&binary, skew_degrees);
        let page = dominant_outline(&level).ok_or_else(no_region)?;
        let crop = page.bounds;
        let cropped =
            image::imageops::crop_imm(&level, crop.x, crop.y, crop.width, crop.height).to_image();
        if !has_black(&cropped) {
            return Err(no_region());
        }

        let cleaned = remove_noise(
            &cropped,
            self.settings.noise_radius,
            self.settings.median_radius,
        );
        let image = thicken_strokes(&cleaned, self.settings.thicken_radius);

        debug!(
            "Normalized {}x{} photo: threshold {}, skew {:.2} deg, crop {:?}",
            gray.width(),
            gray.height(),
            threshold,
            skew_degrees,
            crop
        );

        Ok(NormalizedPage {
            image,
            skew_degrees,
            crop,
            threshold,
        })
    }

    /// Rotate a binary image by `skew_degrees` and snap it back to two values.
    /// Skews below the configured minimum are left alone.
    pub fn deskew(&self, binary: &GrayImage, skew_degrees: f32) -> GrayImage {
        if skew_degrees.abs() < self.settings.min_skew_degrees {
            return binary.clone();
        }
        let rotated = rotate_replicate(binary, skew_degrees);
        threshold_above(&rotated, self.settings.rebinarize_level)
    }
}
