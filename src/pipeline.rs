//! End-to-end diagnosis: regions in, one result per face out.

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, ChannelOrder};
use crate::canvas::load_canonical;
use crate::classify::{evaluate, DiagnosticResult, FaceStatistics, Ratios, Thresholds};
use crate::error::Result;
use crate::landmarker::FaceLandmarker;
use crate::mask::mask_region;
use crate::regions::FaceRegions;
use crate::types::BoundingBox;

/// Settings for one diagnosis run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticConfig {
    pub thresholds: Thresholds,
    pub channel_order: ChannelOrder,
}

/// Everything computed for one face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceReport {
    pub face: Option<BoundingBox>,
    pub statistics: FaceStatistics,
    /// `None` when the face was gated out before any ratio was formed.
    pub ratios: Option<Ratios>,
    pub result: DiagnosticResult,
}

impl FaceReport {
    fn no_face() -> Self {
        Self {
            face: None,
            statistics: FaceStatistics::default(),
            ratios: None,
            result: DiagnosticResult::NoFaceDetected,
        }
    }
}

/// Mask and aggregate every region present in `regions`.
pub fn region_statistics(
    image: &RgbImage,
    regions: &FaceRegions,
    order: ChannelOrder,
) -> FaceStatistics {
    let mut stats = FaceStatistics::default();
    for (region, polygon) in regions.iter() {
        let masked = mask_region(image, polygon);
        let region_stats = aggregate(&masked, region.needs_b(), order);
        debug!(
            %region,
            vertices = polygon.len(),
            count = region_stats.count,
            sum_a = region_stats.sum_a,
            sum_b = region_stats.sum_b,
            "region aggregated"
        );
        stats.set(region, region_stats);
    }
    stats
}

/// Diagnose one face whose regions are already known.
pub fn diagnose_face(
    image: &RgbImage,
    regions: &FaceRegions,
    config: &DiagnosticConfig,
) -> Result<FaceReport> {
    let statistics = region_statistics(image, regions, config.channel_order);
    let ratios = Ratios::compute(&statistics)?;
    let result = match &ratios {
        Some(ratios) => evaluate(ratios, &config.thresholds),
        None => DiagnosticResult::InsufficientLandmarks,
    };

    Ok(FaceReport {
        face: regions.face,
        statistics,
        ratios,
        result,
    })
}

/// Detect every face in `image` and diagnose each independently.
///
/// The outer error covers detection only. Each face carries its own
/// outcome, so a degenerate face does not hide the results of the others.
/// An image without faces yields a single `NoFaceDetected` report.
pub fn diagnose_image(
    image: &RgbImage,
    landmarker: &mut dyn FaceLandmarker,
    config: &DiagnosticConfig,
) -> Result<Vec<Result<FaceReport>>> {
    let faces = landmarker.detect_regions(image)?;
    if faces.is_empty() {
        info!("no face detected");
        return Ok(vec![Ok(FaceReport::no_face())]);
    }

    let reports = faces
        .iter()
        .enumerate()
        .map(|(index, regions)| {
            let report = diagnose_face(image, regions, config);
            match &report {
                Ok(report) => info!(face = index + 1, result = ?report.result, "face diagnosed"),
                Err(e) => warn!(face = index + 1, error = %e, "face could not be diagnosed"),
            }
            report
        })
        .collect();
    Ok(reports)
}

/// Load an image from disk at canonical width and diagnose it.
pub fn diagnose_path<P: AsRef<Path>>(
    path: P,
    landmarker: &mut dyn FaceLandmarker,
    config: &DiagnosticConfig,
) -> Result<(RgbImage, Vec<Result<FaceReport>>)> {
    let image = load_canonical(path)?;
    let reports = diagnose_image(&image, landmarker, config)?;
    Ok((image, reports))
}
