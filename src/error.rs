use thiserror::Error;

use crate::regions::Region;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("Model deserialization error: {0}")]
    Deserialization(#[from] bincode::Error),

    #[error("Invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Face detector error: {0}")]
    Detector(String),

    #[error("Invalid thresholds: {0}")]
    InvalidThresholds(String),

    /// A ratio denominator ended up with no usable pixels.
    #[error("Region {region} has no usable pixels (count = {count})")]
    DegenerateRegion { region: RegionLabel, count: i64 },
}

/// Names the region (or combined region) behind a degenerate statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionLabel {
    Single(Region),
    /// Mouth minus inner mouth.
    Lips,
    /// Left and right eye combined.
    Eyes,
}

impl std::fmt::Display for RegionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegionLabel::Single(region) => write!(f, "{}", region),
            RegionLabel::Lips => write!(f, "lips"),
            RegionLabel::Eyes => write!(f, "eyes"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
