//! Facial regions consumed by the diagnostic pipeline and their 68-point
//! landmark groupings.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::{BoundingBox, PixelPoint, Shape};

/// The landmark groups the color analysis reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Mouth,
    InnerMouth,
    RightEye,
    LeftEye,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Mouth,
        Region::InnerMouth,
        Region::RightEye,
        Region::LeftEye,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Region::Mouth => "mouth",
            Region::InnerMouth => "inner_mouth",
            Region::RightEye => "right_eye",
            Region::LeftEye => "left_eye",
        }
    }

    /// Landmark indices of this region in the iBUG 68-point scheme.
    ///
    /// `Mouth` spans the outer and the inner lip contour (48-67); the inner
    /// contour is then subtracted again through `InnerMouth`.
    pub fn landmark_range(self) -> Range<usize> {
        match self {
            Region::Mouth => 48..68,
            Region::InnerMouth => 60..68,
            Region::RightEye => 36..42,
            Region::LeftEye => 42..48,
        }
    }

    /// Whether the eye `b` channel is summed for this region.
    pub fn needs_b(self) -> bool {
        matches!(self, Region::RightEye | Region::LeftEye)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Region polygons for one detected face.
///
/// A region is present only if the landmarker produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceRegions {
    pub face: Option<BoundingBox>,
    polygons: BTreeMap<Region, Vec<PixelPoint>>,
}

impl FaceRegions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group a predicted shape into region polygons.
    ///
    /// Regions whose landmark range does not fit in the shape are left out,
    /// so a 5-point shape yields no regions at all.
    pub fn from_shape(shape: &Shape, face: BoundingBox) -> Self {
        let mut regions = Self {
            face: Some(face),
            polygons: BTreeMap::new(),
        };

        for region in Region::ALL {
            let range = region.landmark_range();
            if range.end > shape.num_landmarks() {
                continue;
            }
            let polygon = shape.points[range].iter().map(|p| p.to_pixel()).collect();
            regions.polygons.insert(region, polygon);
        }

        regions
    }

    pub fn insert(&mut self, region: Region, polygon: Vec<PixelPoint>) {
        self.polygons.insert(region, polygon);
    }

    pub fn with_region(mut self, region: Region, polygon: Vec<PixelPoint>) -> Self {
        self.insert(region, polygon);
        self
    }

    pub fn get(&self, region: Region) -> Option<&[PixelPoint]> {
        self.polygons.get(&region).map(Vec::as_slice)
    }

    pub fn contains(&self, region: Region) -> bool {
        self.polygons.contains_key(&region)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Region, &[PixelPoint])> {
        self.polygons.iter().map(|(r, p)| (*r, p.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}
