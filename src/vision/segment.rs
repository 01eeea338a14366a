//! Text block segmentation
//!
//! Smears words into lines and lines into paragraphs with a wide, short
//! dilation. The largest blob by area is the reference; every blob strictly
//! wider than `min_width_ratio` times its width is cut out of the untouched
//! page.

use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::config::SegmenterSettings;

use super::geometry::{dominant_index, external_outlines};
use super::preprocess::{binarize, dilate_rect, has_black, has_white, invert};
use super::{BoundingBox, PageImage, RegionImage};

/// Region segmenter
pub struct RegionSegmenter {
    settings: SegmenterSettings,
}

impl RegionSegmenter {
    pub fn new(settings: SegmenterSettings) -> Self {
        Self { settings }
    }

    /// Bounding boxes of the retained text blocks, in tracing order
    pub fn find_blocks(&self, page: &PageImage) -> Vec<BoundingBox> {
        if !has_black(page) {
            return Vec::new();
        }
        let blurred = gaussian_blur_f32(page, self.settings.blur_sigma);
        let (binary, _) = binarize(&blurred);
        let ink = invert(&binary);
        if !has_white(&ink) {
            return Vec::new();
        }

        let merged = dilate_rect(&ink, self.settings.kernel_width, self.settings.kernel_height);
        let outlines = external_outlines(&merged);
        let Some(reference) = dominant_index(&outlines) else {
            return Vec::new();
        };
        let reference_width = outlines[reference].bounds.width as f32;
        let min_width = reference_width * self.settings.min_width_ratio;

        let (width, height) = page.dimensions();
        let blocks: Vec<BoundingBox> = outlines
            .iter()
            .filter(|o| o.bounds.width as f32 > min_width)
            .filter_map(|o| o.bounds.clamp_to(width, height))
            .collect();

        debug!(
            "Segmented {} blobs, kept {} (reference width {}, min width {:.1})",
            outlines.len(),
            blocks.len(),
            reference_width,
            min_width
        );
        blocks
    }

    /// Crop the retained blocks out of the page
    pub fn segment(&self, page: &PageImage) -> Vec<RegionImage> {
        self.find_blocks(page)
            .into_iter()
            .enumerate()
            .map(|(index, bounds)| RegionImage {
                index,
                bounds,
                image: image::imageops::crop_imm(page, bounds.x, bounds.y, bounds.width, bounds.height)
                    .to_image(),
            })
            .collect()
    }
}
