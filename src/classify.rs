//! Threshold rules over combined eye and lip statistics.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::RegionStatistics;
use crate::error::{Error, RegionLabel, Result};
use crate::regions::Region;

const EYE_REDNESS_DISEASES: &[&str] = &[
    "Scleritis",
    "Subconjunctival Hemorrhage",
    "Corneal Ulcer",
    "Extraocular Muscle Entrapment (Inf Rectus)",
    "Muddy Brown Sclera",
    "Periorbital Cellulitis",
    "Periorbital Ecchymosis",
];

const EYE_YELLOWNESS_DISEASES: &[&str] = &["Icterus"];

const LIP_DISEASES: &[&str] = &["Cyanosis"];

const EYE_ASYMMETRY_DISEASES: &[&str] = &[
    "Central CN7 Palsy",
    "Peripheral CN7 Palsy",
    "Extraocular Muscle Entrapment (Inf Rectus)",
    "Horner's Syndrome",
    "Periorbital Cellulitis",
    "Periorbital Ecchymosis",
];

/// The five calibrated constants behind the rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Mean eye `a` above this flags the redness group.
    pub max_a_eyes: f64,
    /// Mean eye `b` above this flags icterus.
    pub max_b_eyes: f64,
    /// Mean lip `a` above this flags cyanosis.
    pub min_a_lips: f64,
    /// Expected left/right eye pixel ratio.
    pub eye_ratio_center: f64,
    /// Allowed deviation from `eye_ratio_center`, exclusive.
    pub eye_ratio_tolerance: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_a_eyes: 7.245,
            max_b_eyes: 1.0001,
            min_a_lips: 12.984,
            eye_ratio_center: 0.958,
            eye_ratio_tolerance: 0.071,
        }
    }
}

impl Thresholds {
    /// Load an override from JSON. Missing fields keep their calibrated value.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let thresholds: Self = serde_json::from_str(&text)?;
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<()> {
        let values = [
            ("max_a_eyes", self.max_a_eyes),
            ("max_b_eyes", self.max_b_eyes),
            ("min_a_lips", self.min_a_lips),
            ("eye_ratio_center", self.eye_ratio_center),
            ("eye_ratio_tolerance", self.eye_ratio_tolerance),
        ];
        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(Error::InvalidThresholds(format!("{} is {}", name, value)));
        }
        if self.eye_ratio_tolerance < 0.0 {
            return Err(Error::InvalidThresholds(format!(
                "eye_ratio_tolerance must not be negative, got {}",
                self.eye_ratio_tolerance
            )));
        }
        Ok(())
    }

    pub fn eye_ratio_band(&self) -> (f64, f64) {
        (
            self.eye_ratio_center - self.eye_ratio_tolerance,
            self.eye_ratio_center + self.eye_ratio_tolerance,
        )
    }
}

/// Statistics for one face, one optional slot per region.
///
/// A slot is `Some` only if that region was observed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FaceStatistics {
    pub mouth: Option<RegionStatistics>,
    pub inner_mouth: Option<RegionStatistics>,
    pub right_eye: Option<RegionStatistics>,
    pub left_eye: Option<RegionStatistics>,
}

impl FaceStatistics {
    pub fn get(&self, region: Region) -> Option<RegionStatistics> {
        match region {
            Region::Mouth => self.mouth,
            Region::InnerMouth => self.inner_mouth,
            Region::RightEye => self.right_eye,
            Region::LeftEye => self.left_eye,
        }
    }

    pub fn set(&mut self, region: Region, stats: RegionStatistics) {
        let slot = match region {
            Region::Mouth => &mut self.mouth,
            Region::InnerMouth => &mut self.inner_mouth,
            Region::RightEye => &mut self.right_eye,
            Region::LeftEye => &mut self.left_eye,
        };
        *slot = Some(stats);
    }

    pub fn with(mut self, region: Region, stats: RegionStatistics) -> Self {
        self.set(region, stats);
        self
    }

    /// Observed regions that count toward the landmark tally.
    ///
    /// The inner mouth only refines the mouth and is not counted.
    pub fn landmark_tally(&self) -> usize {
        [Region::Mouth, Region::RightEye, Region::LeftEye]
            .into_iter()
            .filter(|r| self.get(*r).is_some())
            .count()
    }
}

/// The four scalars the rules compare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ratios {
    /// Mean `a` over both eyes.
    pub a_sum_eye: f64,
    /// Mean `b` over both eyes.
    pub b_sum_eye: f64,
    /// Mean `a` over the lips (mouth minus inner mouth).
    pub a_sum_lip: f64,
    /// Left eye pixel count over right eye pixel count.
    pub eye_ratio: f64,
}

impl Ratios {
    /// Combine region statistics into ratios.
    ///
    /// Returns `Ok(None)` when mouth, right eye or left eye is missing.
    pub fn compute(stats: &FaceStatistics) -> Result<Option<Self>> {
        let (Some(mouth), Some(right_eye), Some(left_eye)) =
            (stats.mouth, stats.right_eye, stats.left_eye)
        else {
            return Ok(None);
        };

        let (lip, lip_label) = match stats.inner_mouth {
            Some(inner) => (mouth - inner, RegionLabel::Lips),
            None => (mouth, RegionLabel::Single(Region::Mouth)),
        };
        let eyes = left_eye + right_eye;

        let eyes_count = denominator(eyes.count, RegionLabel::Eyes)?;
        let lip_count = denominator(lip.count, lip_label)?;
        let right_count = denominator(right_eye.count, RegionLabel::Single(Region::RightEye))?;

        Ok(Some(Self {
            a_sum_eye: eyes.sum_a / eyes_count,
            b_sum_eye: eyes.sum_b / eyes_count,
            a_sum_lip: lip.sum_a / lip_count,
            eye_ratio: left_eye.count as f64 / right_count,
        }))
    }
}

fn denominator(count: i64, region: RegionLabel) -> Result<f64> {
    if count <= 0 {
        tracing::warn!(%region, count, "region has no usable pixels");
        return Err(Error::DegenerateRegion { region, count });
    }
    Ok(count as f64)
}

/// Outcome of analysing one image or one face.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "diseases", rename_all = "snake_case")]
pub enum DiagnosticResult {
    NoFaceDetected,
    InsufficientLandmarks,
    NoSymptomsDetected,
    /// Candidate conditions in rule order; a name may repeat across rules.
    PossibleDiseases(Vec<&'static str>),
}

impl DiagnosticResult {
    /// The message shown to a user for this outcome.
    pub fn message(&self) -> String {
        match self {
            DiagnosticResult::NoFaceDetected => "No face detected".to_string(),
            DiagnosticResult::InsufficientLandmarks => {
                "Not enough facial landmarks detected".to_string()
            }
            DiagnosticResult::NoSymptomsDetected => "No symptoms detected".to_string(),
            DiagnosticResult::PossibleDiseases(names) => {
                let mut text = String::from("List of possible diseases:");
                for name in names {
                    text.push('\n');
                    text.push_str(name);
                }
                text
            }
        }
    }
}

/// Apply the four rules to already computed ratios.
pub fn evaluate(ratios: &Ratios, thresholds: &Thresholds) -> DiagnosticResult {
    let (low, high) = thresholds.eye_ratio_band();
    let rules: [(bool, &[&'static str]); 4] = [
        (ratios.a_sum_eye > thresholds.max_a_eyes, EYE_REDNESS_DISEASES),
        (ratios.b_sum_eye > thresholds.max_b_eyes, EYE_YELLOWNESS_DISEASES),
        (ratios.a_sum_lip > thresholds.min_a_lips, LIP_DISEASES),
        (ratios.eye_ratio > high || ratios.eye_ratio < low, EYE_ASYMMETRY_DISEASES),
    ];

    let diseases: Vec<&'static str> = rules
        .iter()
        .filter(|(fired, _)| *fired)
        .flat_map(|(_, names)| names.iter().copied())
        .collect();

    if diseases.is_empty() {
        DiagnosticResult::NoSymptomsDetected
    } else {
        DiagnosticResult::PossibleDiseases(diseases)
    }
}

/// Gate, combine and evaluate one face's statistics.
pub fn classify(stats: &FaceStatistics, thresholds: &Thresholds) -> Result<DiagnosticResult> {
    match Ratios::compute(stats)? {
        Some(ratios) => Ok(evaluate(&ratios, thresholds)),
        None => Ok(DiagnosticResult::InsufficientLandmarks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Statistics that produce exactly the given ratios.
    ///
    /// Eyes: 95 left and 100 right pixels scaled by `eye_ratio`; lips: 300
    /// mouth pixels minus 100 inner mouth pixels.
    fn stats_for(a_eye: f64, b_eye: f64, a_lip: f64, left_count: i64) -> FaceStatistics {
        let right_count = 100;
        let left = RegionStatistics::new(
            a_eye * left_count as f64,
            b_eye * left_count as f64,
            left_count,
        );
        let right = RegionStatistics::new(
            a_eye * right_count as f64,
            b_eye * right_count as f64,
            right_count,
        );
        let inner = RegionStatistics::new(1000.0, 0.0, 100);
        let mouth = RegionStatistics::new(1000.0 + a_lip * 200.0, 0.0, 300);

        FaceStatistics::default()
            .with(Region::LeftEye, left)
            .with(Region::RightEye, right)
            .with(Region::Mouth, mouth)
            .with(Region::InnerMouth, inner)
    }

    #[test]
    fn healthy_face_has_no_symptoms() {
        let stats = stats_for(5.0, 0.5, 10.0, 95);
        let ratios = Ratios::compute(&stats).unwrap().unwrap();
        assert!((ratios.a_sum_eye - 5.0).abs() < 1e-9);
        assert!((ratios.b_sum_eye - 0.5).abs() < 1e-9);
        assert!((ratios.a_sum_lip - 10.0).abs() < 1e-9);
        assert!((ratios.eye_ratio - 0.95).abs() < 1e-9);

        let result = classify(&stats, &Thresholds::default()).unwrap();
        assert_eq!(result, DiagnosticResult::NoSymptomsDetected);
    }

    #[test]
    fn red_lips_flag_only_cyanosis() {
        let stats = stats_for(5.0, 0.5, 13.5, 95);
        let result = classify(&stats, &Thresholds::default()).unwrap();
        assert_eq!(result, DiagnosticResult::PossibleDiseases(vec!["Cyanosis"]));
    }

    #[test]
    fn eye_redness_threshold_is_strict() {
        let one_pixel_each = |a: f64| {
            FaceStatistics::default()
                .with(Region::LeftEye, RegionStatistics::new(a, 0.0, 1))
                .with(Region::RightEye, RegionStatistics::new(a, 0.0, 1))
                .with(Region::Mouth, RegionStatistics::new(0.0, 0.0, 10))
        };
        let thresholds = Thresholds::default();

        let at = classify(&one_pixel_each(7.245), &thresholds).unwrap();
        assert_eq!(at, DiagnosticResult::NoSymptomsDetected);

        let above = classify(&one_pixel_each(7.246), &thresholds).unwrap();
        assert_eq!(above, DiagnosticResult::PossibleDiseases(EYE_REDNESS_DISEASES.to_vec()));
    }

    #[test]
    fn yellow_eyes_flag_icterus() {
        let stats = stats_for(5.0, 1.2, 10.0, 95);
        let result = classify(&stats, &Thresholds::default()).unwrap();
        assert_eq!(result, DiagnosticResult::PossibleDiseases(vec!["Icterus"]));
    }

    #[test]
    fn eye_asymmetry_fires_on_both_sides_of_the_band() {
        let thresholds = Thresholds::default();
        for left_count in [80, 110] {
            let result = classify(&stats_for(5.0, 0.5, 10.0, left_count), &thresholds).unwrap();
            assert_eq!(
                result,
                DiagnosticResult::PossibleDiseases(EYE_ASYMMETRY_DISEASES.to_vec()),
                "left_count = {}",
                left_count
            );
        }
        for left_count in [89, 100, 102] {
            let result = classify(&stats_for(5.0, 0.5, 10.0, left_count), &thresholds).unwrap();
            assert_eq!(result, DiagnosticResult::NoSymptomsDetected);
        }
    }

    #[test]
    fn all_rules_union_in_table_order_with_duplicates() {
        let stats = stats_for(9.0, 2.0, 20.0, 60);
        let DiagnosticResult::PossibleDiseases(names) =
            classify(&stats, &Thresholds::default()).unwrap()
        else {
            panic!("expected diseases");
        };

        assert_eq!(names.len(), 7 + 1 + 1 + 6);
        assert_eq!(names[0], "Scleritis");
        assert_eq!(names[7], "Icterus");
        assert_eq!(names[8], "Cyanosis");
        assert_eq!(names[9], "Central CN7 Palsy");
        let entrapment = names
            .iter()
            .filter(|n| **n == "Extraocular Muscle Entrapment (Inf Rectus)")
            .count();
        assert_eq!(entrapment, 2);
    }

    #[test]
    fn missing_left_eye_is_insufficient() {
        let stats = FaceStatistics::default()
            .with(Region::Mouth, RegionStatistics::new(100.0, 0.0, 10))
            .with(Region::RightEye, RegionStatistics::new(10.0, 1.0, 10));
        assert_eq!(stats.landmark_tally(), 2);

        let result = classify(&stats, &Thresholds::default()).unwrap();
        assert_eq!(result, DiagnosticResult::InsufficientLandmarks);
    }

    #[test]
    fn inner_mouth_does_not_count_toward_the_tally() {
        let stats = FaceStatistics::default()
            .with(Region::InnerMouth, RegionStatistics::new(1.0, 0.0, 1))
            .with(Region::RightEye, RegionStatistics::new(1.0, 0.0, 1))
            .with(Region::LeftEye, RegionStatistics::new(1.0, 0.0, 1));
        assert_eq!(stats.landmark_tally(), 2);
        assert_eq!(
            classify(&stats, &Thresholds::default()).unwrap(),
            DiagnosticResult::InsufficientLandmarks
        );
    }

    #[test]
    fn lips_without_inner_mouth_use_the_whole_mouth() {
        let stats = FaceStatistics::default()
            .with(Region::Mouth, RegionStatistics::new(140.0, 0.0, 10))
            .with(Region::RightEye, RegionStatistics::new(0.0, 0.0, 10))
            .with(Region::LeftEye, RegionStatistics::new(0.0, 0.0, 10));
        let ratios = Ratios::compute(&stats).unwrap().unwrap();
        assert!((ratios.a_sum_lip - 14.0).abs() < 1e-9);
    }

    #[test]
    fn empty_right_eye_is_degenerate() {
        let stats = FaceStatistics::default()
            .with(Region::Mouth, RegionStatistics::new(100.0, 0.0, 10))
            .with(Region::RightEye, RegionStatistics::default())
            .with(Region::LeftEye, RegionStatistics::new(10.0, 1.0, 10));

        let err = classify(&stats, &Thresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::DegenerateRegion {
                region: RegionLabel::Single(Region::RightEye),
                count: 0
            }
        ));
    }

    #[test]
    fn empty_eyes_are_degenerate() {
        let stats = FaceStatistics::default()
            .with(Region::Mouth, RegionStatistics::new(100.0, 0.0, 10))
            .with(Region::RightEye, RegionStatistics::default())
            .with(Region::LeftEye, RegionStatistics::default());

        let err = classify(&stats, &Thresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::DegenerateRegion {
                region: RegionLabel::Eyes,
                ..
            }
        ));
    }

    #[test]
    fn inner_mouth_larger_than_mouth_is_degenerate() {
        let stats = FaceStatistics::default()
            .with(Region::Mouth, RegionStatistics::new(100.0, 0.0, 10))
            .with(Region::InnerMouth, RegionStatistics::new(150.0, 0.0, 12))
            .with(Region::RightEye, RegionStatistics::new(10.0, 1.0, 10))
            .with(Region::LeftEye, RegionStatistics::new(10.0, 1.0, 10));

        let err = classify(&stats, &Thresholds::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::DegenerateRegion {
                region: RegionLabel::Lips,
                count: -2
            }
        ));
    }

    #[test]
    fn thresholds_reject_nonsense() {
        let mut thresholds = Thresholds::default();
        assert!(thresholds.validate().is_ok());

        thresholds.eye_ratio_tolerance = -0.1;
        assert!(matches!(thresholds.validate(), Err(Error::InvalidThresholds(_))));

        thresholds.eye_ratio_tolerance = 0.071;
        thresholds.max_a_eyes = f64::NAN;
        assert!(matches!(thresholds.validate(), Err(Error::InvalidThresholds(_))));
    }

    #[test]
    fn partial_threshold_override_keeps_defaults() {
        let thresholds: Thresholds = serde_json::from_str(r#"{ "min_a_lips": 15.0 }"#).unwrap();
        assert_eq!(thresholds.min_a_lips, 15.0);
        assert_eq!(thresholds.max_a_eyes, 7.245);

        let path = std::env::temp_dir().join("face_chroma_thresholds.json");
        std::fs::write(&path, r#"{ "max_b_eyes": 2.5 }"#).unwrap();
        let loaded = Thresholds::load(&path).unwrap();
        assert_eq!(loaded.max_b_eyes, 2.5);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn messages_match_the_user_facing_text() {
        assert_eq!(DiagnosticResult::NoFaceDetected.message(), "No face detected");
        assert_eq!(
            DiagnosticResult::PossibleDiseases(vec!["Icterus", "Cyanosis"]).message(),
            "List of possible diseases:\nIcterus\nCyanosis"
        );
    }

    #[test]
    fn results_serialize_with_a_status_tag() {
        let json = serde_json::to_value(DiagnosticResult::PossibleDiseases(vec!["Cyanosis"])).unwrap();
        assert_eq!(json["status"], "possible_diseases");
        assert_eq!(json["diseases"][0], "Cyanosis");

        let json = serde_json::to_value(DiagnosticResult::NoSymptomsDetected).unwrap();
        assert_eq!(json["status"], "no_symptoms_detected");
    }
}
