//! Face detection and landmark extraction behind a single capability.

use std::fs;
use std::path::Path;

use image::RgbImage;
use rustface::{Detector, ImageData};
use serde::{Deserialize, Serialize};

use crate::canvas::to_gray;
use crate::error::{Error, Result};
use crate::predictor::ShapePredictor;
use crate::regions::FaceRegions;
use crate::types::BoundingBox;

/// Maps a canonical image to the region polygons of every face in it.
///
/// Implementations are built once by the application and borrowed for each
/// request.
pub trait FaceLandmarker {
    fn detect_regions(&mut self, image: &RgbImage) -> Result<Vec<FaceRegions>>;
}

/// Tuning for the SeetaFace cascade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub window_step: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

/// rustface detector followed by an ERT shape predictor.
pub struct DlibLandmarker {
    detector: Box<dyn Detector>,
    predictor: ShapePredictor,
}

impl DlibLandmarker {
    pub fn new(detector: Box<dyn Detector>, predictor: ShapePredictor) -> Self {
        Self {
            detector,
            predictor,
        }
    }

    /// Load a SeetaFace detector model and a landmark model.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        detector_path: P,
        landmarks_path: Q,
        settings: DetectorSettings,
    ) -> Result<Self> {
        let detector_path = detector_path.as_ref();
        let path_str = detector_path.to_str().ok_or_else(|| {
            Error::Detector(format!("Invalid detector path {:?}", detector_path))
        })?;
        let mut detector = rustface::create_detector(path_str)
            .map_err(|e| Error::Detector(format!("Failed to load {}: {}", path_str, e)))?;
        detector.set_min_face_size(settings.min_face_size);
        detector.set_score_thresh(settings.score_threshold);
        detector.set_pyramid_scale_factor(settings.pyramid_scale_factor);
        detector.set_slide_window_step(settings.window_step, settings.window_step);

        let predictor = ShapePredictor::open(landmarks_path)?;
        tracing::debug!(
            landmarks = predictor.num_landmarks(),
            stages = predictor.num_cascade_stages(),
            "landmark model loaded"
        );

        Ok(Self::new(detector, predictor))
    }

    pub fn predictor(&self) -> &ShapePredictor {
        &self.predictor
    }
}

impl FaceLandmarker for DlibLandmarker {
    fn detect_regions(&mut self, image: &RgbImage) -> Result<Vec<FaceRegions>> {
        let gray = to_gray(image);
        let faces = self
            .detector
            .detect(&ImageData::new(gray.as_raw(), gray.width(), gray.height()));
        tracing::debug!(faces = faces.len(), "face detection finished");

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                let rect = BoundingBox::new(
                    bbox.x() as f32,
                    bbox.y() as f32,
                    bbox.width() as f32,
                    bbox.height() as f32,
                );
                let shape = self.predictor.predict(&gray, &rect);
                FaceRegions::from_shape(&shape, rect)
            })
            .collect())
    }
}

/// Region polygons supplied up front, e.g. from another landmark tool.
///
/// Every call returns the same faces regardless of the image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrecomputedLandmarker {
    faces: Vec<FaceRegions>,
}

impl PrecomputedLandmarker {
    pub fn new(faces: Vec<FaceRegions>) -> Self {
        Self { faces }
    }

    /// Read a JSON array of faces, each an object of region polygons.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl FaceLandmarker for PrecomputedLandmarker {
    fn detect_regions(&mut self, _image: &RgbImage) -> Result<Vec<FaceRegions>> {
        Ok(self.faces.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::Region;
    use crate::types::PixelPoint;

    #[test]
    fn precomputed_regions_round_trip_through_json() {
        let face = FaceRegions::new().with_region(
            Region::LeftEye,
            vec![PixelPoint::new(1, 2), PixelPoint::new(5, 2), PixelPoint::new(3, 6)],
        );
        let landmarker = PrecomputedLandmarker::new(vec![face.clone()]);

        let path = std::env::temp_dir().join("face_chroma_regions.json");
        fs::write(&path, serde_json::to_string(&landmarker).unwrap()).unwrap();
        let mut loaded = PrecomputedLandmarker::load(&path).unwrap();
        fs::remove_file(&path).ok();

        let faces = loaded.detect_regions(&RgbImage::new(1, 1)).unwrap();
        assert_eq!(faces, vec![face]);
    }

    #[test]
    fn region_file_accepts_plain_polygons() {
        let json = r#"[{
            "face": null,
            "polygons": {
                "right_eye": [{"x": 0, "y": 0}, {"x": 4, "y": 0}, {"x": 2, "y": 3}]
            }
        }]"#;
        let landmarker: PrecomputedLandmarker = serde_json::from_str(json).unwrap();
        assert_eq!(landmarker.faces.len(), 1);
        assert_eq!(landmarker.faces[0].get(Region::RightEye).map(|p| p.len()), Some(3));
        assert!(!landmarker.faces[0].contains(Region::Mouth));
    }

    #[test]
    fn missing_detector_model_is_reported() {
        let result = DlibLandmarker::open(
            "/nonexistent/seeta.bin",
            "/nonexistent/landmarks.dat",
            DetectorSettings::default(),
        );
        assert!(matches!(result, Err(Error::Detector(_)) | Err(Error::Io(_))));
    }
}
