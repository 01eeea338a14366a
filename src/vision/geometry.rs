//! Contour helpers: external outlines, dominant outline, skew angle
//!
//! Contours are traced on white (non-zero) pixels.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

use super::BoundingBox;

/// An external outline with its bounding box and enclosed area
#[derive(Debug, Clone)]
pub struct Outline {
    pub points: Vec<Point<i32>>,
    pub bounds: BoundingBox,
    pub area: f64,
}

impl Outline {
    fn from_contour(contour: Contour<i32>) -> Option<Self> {
        let bounds = BoundingBox::from_points(&contour.points)?;
        let area = polygon_area(&contour.points);
        Some(Self {
            points: contour.points,
            bounds,
            area,
        })
    }

    /// Ordering key: enclosed area, then bounding-box area for degenerate
    /// (line-shaped) outlines
    fn size_key(&self) -> (f64, u64) {
        (self.area, self.bounds.area())
    }
}

/// Outer borders that are not nested inside another shape, in tracing order.
///
/// Shapes touching the image edge count as well: the mask is traced inside a
/// one pixel black frame and the points are shifted back afterwards.
pub fn external_outlines(binary: &GrayImage) -> Vec<Outline> {
    find_contours::<i32>(&pad_black(binary))
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|mut c| {
            for p in &mut c.points {
                p.x -= 1;
                p.y -= 1;
            }
            Outline::from_contour(c)
        })
        .collect()
}

fn pad_black(binary: &GrayImage) -> GrayImage {
    let mut padded = GrayImage::new(binary.width() + 2, binary.height() + 2);
    image::imageops::replace(&mut padded, binary, 1, 1);
    padded
}

/// Index of the largest outline, first one wins on ties
pub fn dominant_index(outlines: &[Outline]) -> Option<usize> {
    let mut best: Option<(usize, (f64, u64))> = None;
    for (i, outline) in outlines.iter().enumerate() {
        let key = outline.size_key();
        if best.map_or(true, |(_, best_key)| key > best_key) {
            best = Some((i, key));
        }
    }
    best.map(|(i, _)| i)
}

/// Largest external outline of a binary image
pub fn dominant_outline(binary: &GrayImage) -> Option<Outline> {
    let mut outlines = external_outlines(binary);
    let index = dominant_index(&outlines)?;
    Some(outlines.swap_remove(index))
}

/// Shoelace area of a closed polygon
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (twice_area as f64 / 2.0).abs()
}

/// Fold an angle into (-45, 45].
///
/// A rectangle looks the same every 90 degrees, so its tilt is only known up
/// to a quarter turn.
pub fn fold_angle(degrees: f32) -> f32 {
    let mut angle = degrees % 90.0;
    if angle > 45.0 {
        angle -= 90.0;
    } else if angle <= -45.0 {
        angle += 90.0;
    }
    angle
}

/// Tilt of the minimum-area rectangle around `points`, in degrees within
/// (-45, 45]. Positive means the shape is turned clockwise on screen.
///
/// Rotating calipers over the convex hull: the minimum-area enclosing
/// rectangle has one side collinear with a hull edge.
pub fn skew_angle(points: &[Point<i32>]) -> f32 {
    let hull: Vec<Point<i32>> = convex_hull(points);
    if hull.len() < 3 {
        return 0.0;
    }

    let mut best_area = f64::INFINITY;
    let mut best_angle = 0.0f64;
    for (i, a) in hull.iter().enumerate() {
        let b = &hull[(i + 1) % hull.len()];
        let (ex, ey) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
        let len = ex.hypot(ey);
        if len == 0.0 {
            continue;
        }
        let (ux, uy) = (ex / len, ey / len);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let (px, py) = (p.x as f64, p.y as f64);
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            min_u = min_u.min(u);
            max_u = max_u.max(u);
            min_v = min_v.min(v);
            max_v = max_v.max(v);
        }

        let area = (max_u - min_u) * (max_v - min_v);
        if area < best_area {
            best_area = area;
            best_angle = uy.atan2(ux).to_degrees();
        }
    }

    fold_angle(best_angle as f32)
}
