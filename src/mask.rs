//! Polygon rasterization and image masking.

use image::{Rgb, RgbImage};

use crate::types::PixelPoint;

/// Per-pixel inclusion grid for one polygon.
///
/// A pixel `(x, y)` is included when the integer point `(x, y)` lies inside
/// the closed polygon or on one of its edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl Mask {
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width as usize * height as usize],
        }
    }

    /// Rasterize `polygon` over a `width` x `height` grid.
    ///
    /// A polygon with zero area produces an empty mask: fewer than three
    /// vertices, or vertices that all lie on one line. Self-intersecting
    /// polygons still fill by the even-odd rule.
    pub fn from_polygon(width: u32, height: u32, polygon: &[PixelPoint]) -> Self {
        let mut mask = Self::empty(width, height);
        if width == 0 || height == 0 || is_collinear(polygon) {
            return mask;
        }

        // Only the polygon's bounding box can contain inside points.
        let (min_x, max_x, min_y, max_y) = polygon.iter().fold(
            (i32::MAX, i32::MIN, i32::MAX, i32::MIN),
            |(x0, x1, y0, y1), p| (x0.min(p.x), x1.max(p.x), y0.min(p.y), y1.max(p.y)),
        );
        let x_start = min_x.max(0);
        let y_start = min_y.max(0);
        let x_end = max_x.min(width as i32 - 1);
        let y_end = max_y.min(height as i32 - 1);

        for y in y_start..=y_end {
            for x in x_start..=x_end {
                if point_in_polygon(polygon, x, y) {
                    let idx = y as usize * width as usize + x as usize;
                    mask.bits[idx] = true;
                }
            }
        }

        mask
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bits[y as usize * self.width as usize + x as usize]
    }

    /// Number of included pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    /// Copy `image`, zeroing every pixel outside the mask.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        debug_assert_eq!(image.dimensions(), (self.width, self.height));
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            if self.contains(x, y) {
                *image.get_pixel(x, y)
            } else {
                Rgb([0, 0, 0])
            }
        })
    }
}

/// Mask `image` with `polygon`, returning a new image where everything
/// outside the polygon is black.
pub fn mask_region(image: &RgbImage, polygon: &[PixelPoint]) -> RgbImage {
    Mask::from_polygon(image.width(), image.height(), polygon).apply(image)
}

/// Even-odd crossing test with edges counted as inside.
///
/// Coordinates are widened before any arithmetic so vertices anywhere in the
/// `i32` range are handled.
fn point_in_polygon(polygon: &[PixelPoint], x: i32, y: i32) -> bool {
    let (x, y) = (x as i128, y as i128);
    let n = polygon.len();
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (ax, ay) = widen(polygon[i]);
        let (bx, by) = widen(polygon[j]);

        if on_segment((ax, ay), (bx, by), x, y) {
            return true;
        }

        if (ay > y) != (by > y) {
            // Compare x against the edge's crossing at height y without
            // leaving integer arithmetic.
            let dy = by - ay;
            let lhs = (x - ax) * dy;
            let rhs = (y - ay) * (bx - ax);
            let left_of_edge = if dy > 0 { lhs < rhs } else { lhs > rhs };
            if left_of_edge {
                inside = !inside;
            }
        }

        j = i;
    }

    inside
}

fn widen(p: PixelPoint) -> (i128, i128) {
    (p.x as i128, p.y as i128)
}

fn cross(a: (i128, i128), b: (i128, i128), x: i128, y: i128) -> i128 {
    (b.0 - a.0) * (y - a.1) - (b.1 - a.1) * (x - a.0)
}

fn on_segment(a: (i128, i128), b: (i128, i128), x: i128, y: i128) -> bool {
    cross(a, b, x, y) == 0
        && x >= a.0.min(b.0)
        && x <= a.0.max(b.0)
        && y >= a.1.min(b.1)
        && y <= a.1.max(b.1)
}

/// True when the vertices span no area: fewer than three of them, or all on
/// one line.
fn is_collinear(polygon: &[PixelPoint]) -> bool {
    if polygon.len() < 3 {
        return true;
    }
    let origin = widen(polygon[0]);
    let Some(direction) = polygon.iter().map(|p| widen(*p)).find(|p| *p != origin) else {
        return true;
    };
    polygon
        .iter()
        .all(|p| cross(origin, direction, p.x as i128, p.y as i128) == 0)
}

/// Area of a closed polygon using the shoelace formula.
pub fn polygon_area(points: &[PixelPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut twice_area: i128 = 0;
    for i in 0..n {
        let (xi, yi) = widen(points[i]);
        let (xj, yj) = widen(points[(i + 1) % n]);
        twice_area += xi * yj - xj * yi;
    }

    (twice_area as f64 / 2.0).abs()
}
