//! Reader for dlib's `shape_predictor` serialization.
//!
//! Accepts raw `.dat` files and bzip2-compressed `.dat.bz2` files as
//! distributed in the dlib-models repository:
//!
//! ```bash
//! git clone --depth 1 https://github.com/davisking/dlib-models.git
//! ```
//!
//! The 68-point model (`shape_predictor_68_face_landmarks.dat.bz2`) is the
//! one whose landmark layout the region groups expect.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;

use crate::error::{Error, Result};
use crate::predictor::{CascadeStage, RegressionTree, ShapePredictor, Split};
use crate::types::{Point, Shape};

/// dlib's compact integer and float encoding.
///
/// Integers: a control byte (bit 7 = negative, low nibble = byte count)
/// followed by that many little-endian magnitude bytes. Floats: an integer
/// mantissa and an integer exponent, value = mantissa * 2^exponent.
struct DlibReader<R: Read> {
    inner: R,
}

impl<R: Read> DlibReader<R> {
    fn new(inner: R) -> Self {
        Self { inner }
    }

    fn byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.inner.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn int(&mut self) -> Result<i64> {
        let control = self.byte()?;
        let len = (control & 0x0F) as usize;
        if len > 8 {
            return Err(Error::InvalidModel(format!(
                "Integer field claims {} bytes",
                len
            )));
        }

        let mut magnitude: u64 = 0;
        for i in 0..len {
            magnitude |= (self.byte()? as u64) << (8 * i);
        }

        let value = magnitude as i64;
        Ok(if control & 0x80 != 0 { -value } else { value })
    }

    fn count(&mut self) -> Result<usize> {
        let value = self.int()?;
        usize::try_from(value)
            .map_err(|_| Error::InvalidModel(format!("Expected a size, got {}", value)))
    }

    fn float(&mut self) -> Result<f32> {
        let mantissa = self.int()?;
        let exponent = self.int()?;
        if mantissa == 0 {
            return Ok(0.0);
        }
        Ok((mantissa as f64 * 2f64.powi(exponent as i32)) as f32)
    }

    /// A column vector of 2N floats, read back as N points.
    fn point_column(&mut self, expected_points: Option<usize>) -> Result<Vec<Point>> {
        // Matrices are prefixed with negated dimensions.
        let rows = self.int()?.unsigned_abs() as usize;
        let cols = self.int()?.unsigned_abs() as usize;
        if cols != 1 || rows % 2 != 0 {
            return Err(Error::InvalidModel(format!(
                "Expected a 2Nx1 shape matrix, got {}x{}",
                rows, cols
            )));
        }
        if let Some(n) = expected_points {
            if rows != 2 * n {
                return Err(Error::InvalidModel(format!(
                    "Shape matrix has {} rows, expected {}",
                    rows,
                    2 * n
                )));
            }
        }

        let mut points = Vec::with_capacity(rows / 2);
        for _ in 0..rows / 2 {
            let x = self.float()?;
            let y = self.float()?;
            points.push(Point::new(x, y));
        }
        Ok(points)
    }

    fn tree(&mut self, num_landmarks: usize) -> Result<RegressionTree> {
        let num_splits = self.count()?;
        let mut splits = Vec::with_capacity(num_splits);
        for _ in 0..num_splits {
            let idx1 = self.count()? as u32;
            let idx2 = self.count()? as u32;
            let threshold = self.float()?;
            splits.push(Split {
                idx1,
                idx2,
                threshold,
            });
        }

        let num_leaves = self.count()?;
        let mut leaves = Vec::with_capacity(num_leaves);
        for _ in 0..num_leaves {
            leaves.push(Shape::new(self.point_column(Some(num_landmarks))?));
        }

        RegressionTree::new(splits, leaves)
    }
}

/// Load a dlib shape predictor, decompressing `.bz2` files on the fly.
pub fn load_dlib_model<P: AsRef<Path>>(path: P) -> Result<ShapePredictor> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);

    if path.extension().is_some_and(|ext| ext == "bz2") {
        load_dlib_model_from_reader(BzDecoder::new(reader))
    } else {
        load_dlib_model_from_reader(reader)
    }
}

/// Parse an uncompressed dlib shape predictor stream.
pub fn load_dlib_model_from_reader<R: Read>(reader: R) -> Result<ShapePredictor> {
    let mut r = DlibReader::new(reader);

    let version = r.int()?;
    if version != 1 {
        return Err(Error::InvalidModel(format!(
            "Unsupported shape_predictor version: {}",
            version
        )));
    }

    let mean_shape = Shape::new(r.point_column(None)?);
    let num_landmarks = mean_shape.num_landmarks();

    let num_stages = r.count()?;
    let mut forests = Vec::with_capacity(num_stages);
    for _ in 0..num_stages {
        let num_trees = r.count()?;
        let mut trees = Vec::with_capacity(num_trees);
        for _ in 0..num_trees {
            trees.push(r.tree(num_landmarks)?);
        }
        forests.push(trees);
    }

    let num_anchor_sets = r.count()?;
    let mut anchors = Vec::with_capacity(num_anchor_sets);
    for _ in 0..num_anchor_sets {
        let n = r.count()?;
        let mut set = Vec::with_capacity(n);
        for _ in 0..n {
            set.push(r.count()? as u32);
        }
        anchors.push(set);
    }

    let num_offset_sets = r.count()?;
    let mut offsets = Vec::with_capacity(num_offset_sets);
    for _ in 0..num_offset_sets {
        let n = r.count()?;
        let mut set = Vec::with_capacity(n);
        for _ in 0..n {
            let x = r.float()?;
            let y = r.float()?;
            set.push(Point::new(x, y));
        }
        offsets.push(set);
    }

    if anchors.len() != num_stages || offsets.len() != num_stages {
        return Err(Error::InvalidModel(format!(
            "{} cascade stages but {} anchor sets and {} offset sets",
            num_stages,
            anchors.len(),
            offsets.len()
        )));
    }

    let cascade = forests
        .into_iter()
        .zip(anchors)
        .zip(offsets)
        .map(|((trees, anchors), offsets)| CascadeStage {
            anchors,
            offsets,
            trees,
        })
        .collect();

    ShapePredictor::new(mean_shape, cascade)
}
