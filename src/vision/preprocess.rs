//! Pixel-level filters used by the normalizer and the segmenter
//!
//! Every function takes an image buffer and returns a new one. Binary images
//! use 0 for black and 255 for white; morphology treats white as foreground.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::{close, dilate, erode};

/// Convert to single-channel luma
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Binarize with an Otsu threshold: pixels above the level become white.
///
/// A uniform image has no threshold to find and maps to a single class, white
/// if it is bright and black otherwise. Returns the binary image and the level.
pub fn binarize(gray: &GrayImage) -> (GrayImage, u8) {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for p in gray.pixels() {
        min = min.min(p[0]);
        max = max.max(p[0]);
    }
    if min >= max {
        let value = if max >= 128 { 255 } else { 0 };
        return (GrayImage::from_pixel(gray.width(), gray.height(), Luma([value])), max);
    }

    let level = otsu_level(gray);
    (threshold_above(gray, level), level)
}

/// Fixed threshold: strictly above `level` becomes white
pub fn threshold_above(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

/// Swap black and white
pub fn invert(gray: &GrayImage) -> GrayImage {
    let mut out = gray.clone();
    image::imageops::invert(&mut out);
    out
}

/// Whether any pixel is pure black
pub fn has_black(gray: &GrayImage) -> bool {
    gray.pixels().any(|p| p[0] == 0)
}

/// Whether any pixel is pure white
pub fn has_white(gray: &GrayImage) -> bool {
    gray.pixels().any(|p| p[0] == 255)
}

/// Rotate about the image center, keeping the original size.
///
/// Each output pixel samples the source at its own position turned by
/// `degrees` (y axis pointing down), so content skewed by `degrees` comes out
/// level. Uses bicubic interpolation; samples falling outside the source
/// replicate the nearest edge pixel.
pub fn rotate_replicate(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let (sin, cos) = degrees.to_radians().sin_cos();

    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = cos * dx - sin * dy + cx;
        let sy = sin * dx + cos * dy + cy;
        Luma([sample_bicubic(image, sx, sy)])
    })
}

/// Cubic convolution kernel (a = -0.75)
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

fn sample_bicubic(image: &GrayImage, x: f32, y: f32) -> u8 {
    let max_x = image.width() as i64 - 1;
    let max_y = image.height() as i64 - 1;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let mut acc = 0.0f32;
    for j in -1i64..=2 {
        let wy = cubic_weight(fy - j as f32);
        if wy == 0.0 {
            continue;
        }
        let sy = (y0 as i64 + j).clamp(0, max_y) as u32;
        for i in -1i64..=2 {
            let wx = cubic_weight(fx - i as f32);
            let sx = (x0 as i64 + i).clamp(0, max_x) as u32;
            acc += wx * wy * image.get_pixel(sx, sy)[0] as f32;
        }
    }

    acc.round().clamp(0.0, 255.0) as u8
}

/// Speckle removal: dilate, erode, close, then a median filter.
///
/// `radius` sizes the square morphology kernel (0 = 1x1), `median_radius`
/// the median window (1 = 3x3).
pub fn remove_noise(binary: &GrayImage, radius: u8, median_radius: u32) -> GrayImage {
    let dilated = dilate(binary, Norm::LInf, radius);
    let eroded = erode(&dilated, Norm::LInf, radius);
    let closed = close(&eroded, Norm::LInf, radius);
    if median_radius == 0 {
        return closed;
    }
    median_filter(&closed, median_radius, median_radius)
}

/// Thicken dark strokes on a light page: invert, dilate, invert back
pub fn thicken_strokes(binary: &GrayImage, radius: u8) -> GrayImage {
    if radius == 0 {
        return binary.clone();
    }
    let ink = invert(binary);
    let grown = dilate(&ink, Norm::LInf, radius);
    invert(&grown)
}

/// Dilate white pixels with a `width` x `height` rectangle.
///
/// Runs as a horizontal then a vertical running maximum. Even sizes reach
/// one pixel further towards the top-left.
pub fn dilate_rect(mask: &GrayImage, width: u32, height: u32) -> GrayImage {
    let horizontal = max_filter_1d(mask, width, true);
    max_filter_1d(&horizontal, height, false)
}

fn max_filter_1d(image: &GrayImage, size: u32, horizontal: bool) -> GrayImage {
    if size <= 1 {
        return image.clone();
    }
    let (width, height) = image.dimensions();
    let before = (size / 2) as i64;
    let after = (size as i64) - 1 - before;

    GrayImage::from_fn(width, height, |x, y| {
        let (pos, limit) = if horizontal {
            (x as i64, width as i64 - 1)
        } else {
            (y as i64, height as i64 - 1)
        };
        let start = (pos - after).max(0);
        let end = (pos + before).min(limit);
        let mut best = 0u8;
        for k in start..=end {
            let v = if horizontal {
                image.get_pixel(k as u32, y)[0]
            } else {
                image.get_pixel(x, k as u32)[0]
            };
            if v > best {
                best = v;
                if best == 255 {
                    break;
                }
            }
        }
        Luma([best])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn two_tone(width: u32, height: u32, split: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| if x < split { Luma([40]) } else { Luma([210]) })
    }

    #[test]
    fn test_grayscale_is_single_channel() {
        let rgb = RgbImage::from_pixel(3, 2, image::Rgb([255, 0, 0]));
        let gray = to_grayscale(&DynamicImage::ImageRgb8(rgb));
        assert_eq!(gray.dimensions(), (3, 2));
        // Red carries a small share of luma
        assert!(gray.get_pixel(0, 0)[0] > 40 && gray.get_pixel(0, 0)[0] < 90);
    }

    #[test]
    fn test_binarize_is_two_valued() {
        let gray = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 16 + y) % 256) as u8]));
        let (binary, _) = binarize(&gray);
        assert!(binary.pixels().all(|p| p[0] == 0 || p[0] == 255));
    }

    #[test]
    fn test_binarize_separates_classes() {
        let (binary, level) = binarize(&two_tone(10, 4, 5));
        assert!((40..210).contains(&level));
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(9, 0)[0], 255);
    }

    #[test]
    fn test_binarize_uniform_image() {
        let white = GrayImage::from_pixel(8, 8, Luma([250]));
        assert!(binarize(&white).0.pixels().all(|p| p[0] == 255));

        let black = GrayImage::from_pixel(8, 8, Luma([3]));
        assert!(binarize(&black).0.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_invert() {
        let inverted = invert(&two_tone(4, 1, 2));
        assert_eq!(inverted.get_pixel(0, 0)[0], 215);
        assert_eq!(inverted.get_pixel(3, 0)[0], 45);
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let image = GrayImage::from_fn(9, 7, |x, y| Luma([(x * 20 + y * 3) as u8]));
        assert_eq!(rotate_replicate(&image, 0.0), image);
    }

    #[test]
    fn test_rotate_replicates_borders() {
        // A uniform image stays uniform: corners are filled from the edges
        let image = GrayImage::from_pixel(20, 10, Luma([200]));
        let rotated = rotate_replicate(&image, 30.0);
        assert!(rotated.pixels().all(|p| p[0] == 200));
    }

    #[test]
    fn test_rotate_quarter_turn_moves_pixels() {
        let mut image = GrayImage::from_pixel(5, 5, Luma([0]));
        image.put_pixel(4, 2, Luma([255]));
        let rotated = rotate_replicate(&image, 90.0);
        // Output (2, 0) samples source (4, 2)
        assert_eq!(rotated.get_pixel(2, 0)[0], 255);
    }

    #[test]
    fn test_thicken_strokes_grows_ink() {
        let mut page = GrayImage::from_pixel(7, 7, Luma([255]));
        page.put_pixel(3, 3, Luma([0]));
        let thick = thicken_strokes(&page, 1);
        let ink = thick.pixels().filter(|p| p[0] == 0).count();
        assert_eq!(ink, 9);
        assert_eq!(thick.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_remove_noise_drops_speckle() {
        let mut page = GrayImage::from_pixel(9, 9, Luma([255]));
        page.put_pixel(4, 4, Luma([0]));
        let clean = remove_noise(&page, 0, 1);
        assert!(clean.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_dilate_rect_is_wide_and_short() {
        let mut mask = GrayImage::new(21, 21);
        mask.put_pixel(10, 10, Luma([255]));
        let grown = dilate_rect(&mask, 9, 3);
        let lit: Vec<(u32, u32)> = grown
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 255)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert_eq!(lit.len(), 27);
        assert!(lit.iter().all(|&(x, y)| (6..=14).contains(&x) && (9..=11).contains(&y)));
    }
}
