//! Ensemble-of-regression-trees shape predictor.
//!
//! Implements "One Millisecond Face Alignment with an Ensemble of Regression
//! Trees" (Kazemi & Sullivan, 2014) the way dlib evaluates it:
//!
//! 1. Start from the mean shape in normalized face coordinates.
//! 2. For each cascade stage, find the similarity transform from the mean
//!    shape to the current estimate and sample the stage's feature pixels
//!    through it.
//! 3. Every tree in the stage walks its splits on pixel differences and adds
//!    its leaf delta to the estimate.
//! 4. Map the final estimate into image coordinates.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::{extract_feature_pixels, find_similarity_transform, ImageAccess};
use crate::types::{BoundingBox, Point, Shape};

/// One split: compare the difference of two feature pixels to a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub idx1: u32,
    pub idx2: u32,
    pub threshold: f32,
}

/// A complete binary tree stored heap-style: split `i` has children
/// `2i + 1` and `2i + 2`; indices past the last split address leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub splits: Vec<Split>,
    pub leaves: Vec<Shape>,
}

impl RegressionTree {
    pub fn new(splits: Vec<Split>, leaves: Vec<Shape>) -> Result<Self> {
        if leaves.len() != splits.len() + 1 {
            return Err(Error::InvalidModel(format!(
                "Invalid tree: {} splits should have {} leaves, got {}",
                splits.len(),
                splits.len() + 1,
                leaves.len()
            )));
        }
        Ok(Self { splits, leaves })
    }

    /// Walk the tree over precomputed feature pixels and return the leaf.
    pub fn predict(&self, features: &[f32]) -> &Shape {
        let mut i = 0usize;
        while i < self.splits.len() {
            let split = &self.splits[i];
            let diff = features[split.idx1 as usize] - features[split.idx2 as usize];
            // dlib: go left when the difference exceeds the threshold.
            i = if diff > split.threshold { 2 * i + 1 } else { 2 * i + 2 };
        }
        &self.leaves[i - self.splits.len()]
    }

    pub fn depth(&self) -> usize {
        // Leaves are one level below the deepest split.
        (usize::BITS - self.splits.len().leading_zeros()) as usize + 1
    }
}

/// One cascade level: feature pixel layout plus the trees reading it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeStage {
    /// Landmark each feature pixel is anchored to.
    pub anchors: Vec<u32>,
    /// Offset of each feature pixel from its anchor, in mean-shape space.
    pub offsets: Vec<Point>,
    pub trees: Vec<RegressionTree>,
}

impl CascadeStage {
    /// Check that every index this stage dereferences is in range.
    pub fn validate(&self, num_landmarks: usize) -> Result<()> {
        if self.anchors.len() != self.offsets.len() {
            return Err(Error::InvalidModel(format!(
                "{} feature anchors but {} offsets",
                self.anchors.len(),
                self.offsets.len()
            )));
        }
        if let Some(bad) = self.anchors.iter().find(|&&a| a as usize >= num_landmarks) {
            return Err(Error::InvalidModel(format!(
                "Anchor landmark {} out of range for {} landmarks",
                bad, num_landmarks
            )));
        }
        let num_features = self.anchors.len() as u32;
        for tree in &self.trees {
            if let Some(split) = tree
                .splits
                .iter()
                .find(|s| s.idx1 >= num_features || s.idx2 >= num_features)
            {
                return Err(Error::InvalidModel(format!(
                    "Split feature ({}, {}) out of range for {} features",
                    split.idx1, split.idx2, num_features
                )));
            }
            if let Some(leaf) = tree.leaves.iter().find(|l| l.num_landmarks() != num_landmarks) {
                return Err(Error::InvalidModel(format!(
                    "Leaf delta has {} points, expected {}",
                    leaf.num_landmarks(),
                    num_landmarks
                )));
            }
        }
        Ok(())
    }
}

/// A trained landmark model.
///
/// ```ignore
/// let model = ShapePredictor::open("shape_predictor_68_face_landmarks.dat.bz2")?;
/// let landmarks = model.predict(&gray, &face_rect);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePredictor {
    /// Mean shape in the face box's [0,1] frame.
    mean_shape: Shape,
    cascade: Vec<CascadeStage>,
}

impl ShapePredictor {
    pub fn new(mean_shape: Shape, cascade: Vec<CascadeStage>) -> Result<Self> {
        if mean_shape.num_landmarks() == 0 {
            return Err(Error::InvalidModel("Mean shape has no landmarks".into()));
        }
        for stage in &cascade {
            stage.validate(mean_shape.num_landmarks())?;
        }
        Ok(Self {
            mean_shape,
            cascade,
        })
    }

    /// Open a model, picking the format from the file name: `.bin` is this
    /// crate's bincode cache, anything else is read as dlib serialization
    /// (`.dat`, or bzip2-compressed `.dat.bz2`).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.extension().is_some_and(|ext| ext == "bin") {
            Self::load(path)
        } else {
            crate::dlib::load_dlib_model(path)
        }
    }

    /// Load a bincode cache written by [`ShapePredictor::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        // Re-check indices; the cache may be from an untrusted source.
        Self::new(model.mean_shape, model.cascade)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bincode::serialize(self)?)?;
        writer.flush()?;
        Ok(())
    }

    pub fn num_landmarks(&self) -> usize {
        self.mean_shape.num_landmarks()
    }

    pub fn num_cascade_stages(&self) -> usize {
        self.cascade.len()
    }

    /// Predict landmark positions, in image coordinates, for the face in
    /// `face_rect`.
    pub fn predict<I: ImageAccess>(&self, image: &I, face_rect: &BoundingBox) -> Shape {
        let mut current = self.mean_shape.clone();

        for stage in &self.cascade {
            let tform = find_similarity_transform(&self.mean_shape, &current);
            let features = extract_feature_pixels(
                image,
                face_rect,
                &current,
                &tform,
                &stage.anchors,
                &stage.offsets,
            );
            for tree in &stage.trees {
                current.add_delta(tree.predict(&features));
            }
        }

        Shape::new(
            current
                .points
                .iter()
                .map(|p| face_rect.denormalize_point(*p))
                .collect(),
        )
    }
}
