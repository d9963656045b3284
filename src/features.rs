use image::GrayImage;

use crate::types::{BoundingBox, Point, Shape};

/// Read access to grayscale intensities.
pub trait ImageAccess {
    /// Intensity at (x, y), or 0 outside the image.
    fn get_pixel(&self, x: i32, y: i32) -> u8;

    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

impl ImageAccess for GrayImage {
    fn get_pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width() as i32 || y >= self.height() as i32 {
            return 0;
        }
        self.get_pixel(x as u32, y as u32).0[0]
    }

    fn width(&self) -> u32 {
        GrayImage::width(self)
    }

    fn height(&self) -> u32 {
        GrayImage::height(self)
    }
}

/// Rotation and scale part of a 2D similarity transform.
///
/// Translation is left out: it is only ever applied to offsets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform2D {
    m: [[f32; 2]; 2],
}

impl SimilarityTransform2D {
    pub const fn identity() -> Self {
        Self {
            m: [[1.0, 0.0], [0.0, 1.0]],
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.m[0][0] * p.x + self.m[0][1] * p.y,
            self.m[1][0] * p.x + self.m[1][1] * p.y,
        )
    }

    /// Uniform scale factor of the transform.
    pub fn scale(&self) -> f32 {
        (self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]).abs().sqrt()
    }
}

/// Least-squares similarity (rotation + uniform scale) mapping `from` onto
/// `to`, as in Umeyama's method.
///
/// In two dimensions the SVD reduces to a closed form: with the
/// cross-covariance `[[a, b], [c, d]]`, the optimal rotation angle is
/// `atan2(c - b, a + d)` and `scale * cos`, `scale * sin` are those two terms
/// divided by the variance of `from`.
pub fn find_similarity_transform(from: &Shape, to: &Shape) -> SimilarityTransform2D {
    debug_assert_eq!(from.num_landmarks(), to.num_landmarks());
    if from.num_landmarks() == 0 {
        return SimilarityTransform2D::identity();
    }

    let mean_from = from.centroid();
    let mean_to = to.centroid();

    let mut sigma_from = 0.0f32;
    let (mut a, mut b, mut c, mut d) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
    for (f, t) in from.points.iter().zip(to.points.iter()) {
        let f = *f - mean_from;
        let t = *t - mean_to;
        sigma_from += f.x * f.x + f.y * f.y;
        a += t.x * f.x;
        b += t.x * f.y;
        c += t.y * f.x;
        d += t.y * f.y;
    }

    if sigma_from == 0.0 {
        return SimilarityTransform2D::identity();
    }

    // The 1/n factors of covariance and variance cancel.
    let cos = (a + d) / sigma_from;
    let sin = (c - b) / sigma_from;
    SimilarityTransform2D {
        m: [[cos, -sin], [sin, cos]],
    }
}

/// Sample the intensity at every feature location of one cascade stage.
///
/// Feature `i` sits at `anchors[i]`'s landmark in `current` (normalized face
/// coordinates), offset by `tform` applied to `offsets[i]`, then mapped into
/// the image through `face`. Pixels are taken at the nearest integer position;
/// locations outside the image read as 0.
pub fn extract_feature_pixels<I: ImageAccess>(
    image: &I,
    face: &BoundingBox,
    current: &Shape,
    tform: &SimilarityTransform2D,
    anchors: &[u32],
    offsets: &[Point],
) -> Vec<f32> {
    anchors
        .iter()
        .zip(offsets.iter())
        .map(|(&anchor, &offset)| {
            let normalized = tform.apply(offset) + current[anchor as usize];
            let p = face.denormalize_point(normalized).to_pixel();
            image.get_pixel(p.x, p.y) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn gray_image_access() {
        let data = vec![
            0, 255, 0, //
            255, 0, 255, //
            0, 255, 0, //
        ];
        let img = GrayImage::from_raw(3, 3, data).unwrap();

        assert_eq!(ImageAccess::get_pixel(&img, 0, 0), 0);
        assert_eq!(ImageAccess::get_pixel(&img, 1, 0), 255);
        assert_eq!(ImageAccess::get_pixel(&img, 1, 1), 0);
        assert_eq!(ImageAccess::get_pixel(&img, -1, 0), 0);
        assert_eq!(ImageAccess::get_pixel(&img, 3, 0), 0);
    }

    #[test]
    fn similarity_of_identical_shapes_is_identity() {
        let shape = Shape::new(vec![
            Point::new(0.2, 0.3),
            Point::new(0.8, 0.3),
            Point::new(0.5, 0.7),
        ]);
        let tform = find_similarity_transform(&shape, &shape);
        let p = tform.apply(Point::new(0.3, -0.4));
        assert!((p.x - 0.3).abs() < 1e-5);
        assert!((p.y + 0.4).abs() < 1e-5);
    }

    #[test]
    fn similarity_recovers_rotation_and_scale() {
        let from = Shape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
        ]);
        // Rotate 90 degrees counter-clockwise, scale by 2, translate.
        let to = Shape::new(
            from.points
                .iter()
                .map(|p| Point::new(-2.0 * p.y + 5.0, 2.0 * p.x - 1.0))
                .collect(),
        );

        let tform = find_similarity_transform(&from, &to);
        assert!((tform.scale() - 2.0).abs() < 1e-5);

        let p = tform.apply(Point::new(1.0, 0.0));
        assert!(p.x.abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn feature_pixels_follow_anchors_and_offsets() {
        // Horizontal gradient: intensity = 20 * x.
        let img = GrayImage::from_fn(10, 10, |x, _| Luma([(x * 20) as u8]));
        let face = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let current = Shape::new(vec![Point::new(0.2, 0.5), Point::new(0.7, 0.5)]);

        let values = extract_feature_pixels(
            &img,
            &face,
            &current,
            &SimilarityTransform2D::identity(),
            &[0, 1, 1],
            &[Point::zero(), Point::zero(), Point::new(0.1, 0.0)],
        );

        assert_eq!(values, vec![40.0, 140.0, 160.0]);
    }

    #[test]
    fn feature_pixels_outside_read_zero() {
        let img = GrayImage::from_pixel(4, 4, Luma([200]));
        let face = BoundingBox::new(0.0, 0.0, 4.0, 4.0);
        let current = Shape::new(vec![Point::new(0.5, 0.5)]);

        let values = extract_feature_pixels(
            &img,
            &face,
            &current,
            &SimilarityTransform2D::identity(),
            &[0, 0],
            &[Point::zero(), Point::new(2.0, 0.0)],
        );
        assert_eq!(values, vec![200.0, 0.0]);
    }
}
