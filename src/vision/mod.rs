//! Vision/OCR Layer
//!
//! Turns a decoded page photo into recognized text blocks:
//! - `normalize`: grayscale, binarize, deskew, crop, clean up
//! - `segment`: isolate paragraph-sized text blocks
//! - `ocr`: run a text engine over each block under a named profile
//! - `tesseract`: the Tesseract command-line backend

pub mod geometry;
pub mod normalize;
pub mod ocr;
pub mod preprocess;
pub mod segment;
pub mod tesseract;

use image::GrayImage;
use imageproc::point::Point;
use serde::Serialize;

pub use normalize::{NormalizedPage, Normalizer};
pub use ocr::{Profile, RecognitionResult, Recognizer, TextEngine};
pub use segment::RegionSegmenter;
pub use tesseract::TesseractCli;

/// Single-channel page image. Binary (0 / 255) once normalized.
pub type PageImage = GrayImage;

/// Axis-aligned rectangle in page coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest box covering every point, `None` for an empty slice.
    /// Negative coordinates are clamped to zero.
    pub fn from_points(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let min_x = min_x.max(0);
        let min_y = min_y.max(0);
        if max_x < min_x || max_y < min_y {
            return None;
        }

        Some(Self {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x) as u32 + 1,
            height: (max_y - min_y) as u32 + 1,
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether the box is non-empty and lies inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.width > 0 && self.height > 0 && self.right() <= width && self.bottom() <= height
    }

    /// Clip the box to a `width` x `height` image, `None` if nothing remains
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let w = self.width.min(width - x);
        let h = self.height.min(height - y);
        (w > 0 && h > 0).then(|| Self::new(x, y, w, h))
    }
}

/// One cropped text block, tagged with where it was cut from
#[derive(Debug, Clone)]
pub struct RegionImage {
    /// Position in segmentation order
    pub index: usize,
    /// Location on the normalized page
    pub bounds: BoundingBox,
    /// Pixels copied from the normalized page
    pub image: GrayImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let points = vec![Point::new(4, 10), Point::new(12, 3), Point::new(7, 7)];
        let bounds = BoundingBox::from_points(&points).unwrap();
        assert_eq!(bounds, BoundingBox::new(4, 3, 9, 8));
        assert_eq!(bounds.area(), 72);
        assert_eq!(bounds.right(), 13);
        assert_eq!(bounds.bottom(), 11);
    }

    #[test]
    fn test_bounds_single_point_is_one_pixel() {
        let bounds = BoundingBox::from_points(&[Point::new(5, 5)]).unwrap();
        assert_eq!((bounds.width, bounds.height), (1, 1));
        assert!(BoundingBox::from_points(&[]).is_none());
    }

    #[test]
    fn test_fits_within() {
        assert!(BoundingBox::new(0, 0, 10, 10).fits_within(10, 10));
        assert!(!BoundingBox::new(1, 0, 10, 10).fits_within(10, 10));
        assert!(!BoundingBox::new(0, 0, 0, 10).fits_within(10, 10));
    }

    #[test]
    fn test_clamp_to() {
        let clipped = BoundingBox::new(8, 8, 10, 10).clamp_to(12, 12).unwrap();
        assert_eq!(clipped, BoundingBox::new(8, 8, 4, 4));
        assert!(BoundingBox::new(20, 20, 5, 5).clamp_to(12, 12).is_none());
    }
}
