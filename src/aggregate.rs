//! Per-region chromaticity sums over a masked image.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::srgb8_to_lab;

/// How the three bytes of a pixel are fed into the sRGB converter.
///
/// The published thresholds were calibrated on pixels read in BGR order and
/// converted as if they were RGB. `Bgr` reproduces that calibration exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl ChannelOrder {
    #[inline]
    fn arrange(self, px: [u8; 3]) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb => px,
            ChannelOrder::Bgr => [px[2], px[1], px[0]],
        }
    }
}

/// Raw Lab sums over the sampled pixels of one region.
///
/// Sums are kept unaveraged so regions can be combined before dividing.
/// `count` is signed: subtracting one region from another may go negative,
/// and that has to be caught rather than divided by.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionStatistics {
    pub sum_a: f64,
    pub sum_b: f64,
    pub count: i64,
}

impl RegionStatistics {
    pub const fn new(sum_a: f64, sum_b: f64, count: i64) -> Self {
        Self { sum_a, sum_b, count }
    }

    pub fn mean_a(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_a / self.count as f64)
    }

    pub fn mean_b(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum_b / self.count as f64)
    }
}

impl std::ops::Add for RegionStatistics {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            sum_a: self.sum_a + rhs.sum_a,
            sum_b: self.sum_b + rhs.sum_b,
            count: self.count + rhs.count,
        }
    }
}

impl std::ops::Sub for RegionStatistics {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            sum_a: self.sum_a - rhs.sum_a,
            sum_b: self.sum_b - rhs.sum_b,
            count: self.count - rhs.count,
        }
    }
}

/// Sum Lab `a` (and `b` when `need_b`) over every non-black pixel.
///
/// Pure black marks "outside the mask", so genuinely black pixels inside the
/// region are dropped as well. The thresholds depend on this.
pub fn aggregate(masked: &RgbImage, need_b: bool, order: ChannelOrder) -> RegionStatistics {
    let mut stats = RegionStatistics::default();

    for px in masked.pixels() {
        if px.0 == [0, 0, 0] {
            continue;
        }
        let lab = srgb8_to_lab(order.arrange(px.0));
        stats.sum_a += lab.a;
        if need_b {
            stats.sum_b += lab.b;
        }
        stats.count += 1;
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::mask_region;
    use crate::types::PixelPoint;
    use image::Rgb;

    fn square(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<PixelPoint> {
        vec![
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y0),
            PixelPoint::new(x1, y1),
            PixelPoint::new(x0, y1),
        ]
    }

    #[test]
    fn black_pixels_inside_the_polygon_are_skipped() {
        let mut image = RgbImage::from_pixel(20, 20, Rgb([180, 120, 110]));
        image.put_pixel(8, 8, Rgb([0, 0, 0]));
        image.put_pixel(9, 9, Rgb([0, 0, 0]));

        let masked = mask_region(&image, &square(5, 5, 14, 14));
        let stats = aggregate(&masked, false, ChannelOrder::Rgb);

        assert_eq!(stats.count, 10 * 10 - 2);
    }

    #[test]
    fn uniform_region_sums_scale_with_count() {
        let color = [200u8, 90, 80];
        let image = RgbImage::from_pixel(30, 30, Rgb(color));
        let masked = mask_region(&image, &square(0, 0, 9, 4));
        let stats = aggregate(&masked, true, ChannelOrder::Rgb);

        let lab = srgb8_to_lab(color);
        assert_eq!(stats.count, 50);
        assert!((stats.sum_a - 50.0 * lab.a).abs() < 1e-9);
        assert!((stats.sum_b - 50.0 * lab.b).abs() < 1e-9);
        assert!((stats.mean_a().unwrap() - lab.a).abs() < 1e-9);
    }

    #[test]
    fn b_is_left_untouched_when_not_requested() {
        let image = RgbImage::from_pixel(4, 4, Rgb([240, 200, 40]));
        let stats = aggregate(&image, false, ChannelOrder::Rgb);
        assert_eq!(stats.count, 16);
        assert_eq!(stats.sum_b, 0.0);
    }

    #[test]
    fn bgr_order_swaps_red_and_blue() {
        let image = RgbImage::from_pixel(2, 2, Rgb([30, 60, 220]));
        let rgb = aggregate(&image, true, ChannelOrder::Rgb);
        let bgr = aggregate(&image, true, ChannelOrder::Bgr);

        let swapped = srgb8_to_lab([220, 60, 30]);
        assert!((bgr.sum_a - 4.0 * swapped.a).abs() < 1e-9);
        assert!(rgb.sum_b < 0.0);
        assert!(bgr.sum_b > 0.0);
    }

    #[test]
    fn empty_mask_gives_zero_count() {
        let image = RgbImage::from_pixel(10, 10, Rgb([100, 100, 100]));
        let masked = mask_region(&image, &[]);
        let stats = aggregate(&masked, true, ChannelOrder::Rgb);
        assert_eq!(stats, RegionStatistics::default());
        assert_eq!(stats.mean_a(), None);
    }

    #[test]
    fn statistics_combine_componentwise() {
        let a = RegionStatistics::new(10.0, 4.0, 5);
        let b = RegionStatistics::new(2.0, 1.0, 3);
        assert_eq!(a + b, RegionStatistics::new(12.0, 5.0, 8));
        assert_eq!(a - b, RegionStatistics::new(8.0, 3.0, 2));
        assert_eq!((b - a).count, -2);
    }
}
