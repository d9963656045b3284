//! # face-chroma
//!
//! Facial region color screening in pure Rust.
//!
//! Given a face photo and the landmark polygons of its eyes and mouth, this
//! crate measures the CIELab chromaticity of each region and compares a few
//! derived ratios against fixed empirical thresholds, producing a list of
//! candidate conditions (eye redness, icterus, cyanosis, eye asymmetry).
//! The heuristic is not clinically validated.
//!
//! ## Pipeline
//!
//! 1. Rasterize each region polygon into a mask and black out everything
//!    outside it ([`mask_region`]).
//! 2. Convert every remaining non-black pixel to CIELab ([`to_lab`]) and sum
//!    `a` (and `b` for the eyes) per region ([`aggregate`]).
//! 3. Combine the regions: lips = mouth minus inner mouth, eyes = left plus
//!    right, then form the four ratios ([`Ratios`]).
//! 4. Apply the threshold rules ([`classify`]).
//!
//! Landmarks come from a [`FaceLandmarker`]. [`DlibLandmarker`] runs a
//! SeetaFace detector (via `rustface`) and an ERT shape predictor loaded from
//! dlib's `shape_predictor_68_face_landmarks.dat`.
//!
//! ## Quick Start
//!
//! ```rust
//! use face_chroma::{
//!     diagnose_face, DiagnosticConfig, DiagnosticResult, FaceRegions, PixelPoint, Region,
//! };
//! use image::{Rgb, RgbImage};
//!
//! let rect = |x0, y0, x1, y1| {
//!     vec![
//!         PixelPoint::new(x0, y0),
//!         PixelPoint::new(x1, y0),
//!         PixelPoint::new(x1, y1),
//!         PixelPoint::new(x0, y1),
//!     ]
//! };
//!
//! let image = RgbImage::from_pixel(100, 100, Rgb([128, 128, 128]));
//! let regions = FaceRegions::new()
//!     .with_region(Region::RightEye, rect(20, 20, 35, 28))
//!     .with_region(Region::LeftEye, rect(60, 20, 75, 28))
//!     .with_region(Region::Mouth, rect(35, 60, 65, 80))
//!     .with_region(Region::InnerMouth, rect(40, 66, 60, 74));
//!
//! let report = diagnose_face(&image, &regions, &DiagnosticConfig::default()).unwrap();
//! assert_eq!(report.result, DiagnosticResult::NoSymptomsDetected);
//! ```

pub mod aggregate;
pub mod canvas;
pub mod classify;
pub mod color;
pub mod dlib;
mod error;
mod features;
pub mod landmarker;
pub mod mask;
pub mod pipeline;
mod predictor;
pub mod regions;
mod types;

pub use aggregate::{aggregate, ChannelOrder, RegionStatistics};
pub use classify::{classify, evaluate, DiagnosticResult, FaceStatistics, Ratios, Thresholds};
pub use color::{to_lab, Lab};
pub use error::{Error, RegionLabel, Result};
pub use features::{find_similarity_transform, ImageAccess, SimilarityTransform2D};
pub use landmarker::{DetectorSettings, DlibLandmarker, FaceLandmarker, PrecomputedLandmarker};
pub use mask::{mask_region, polygon_area, Mask};
pub use pipeline::{diagnose_face, diagnose_image, diagnose_path, DiagnosticConfig, FaceReport};
pub use predictor::{CascadeStage, RegressionTree, ShapePredictor, Split};
pub use regions::{FaceRegions, Region};
pub use types::{BoundingBox, PixelPoint, Point, Shape};
