//! sRGB to CIELab conversion.
//!
//! The diagnostic thresholds were calibrated against one specific transform:
//! sRGB companding, the sRGB/D65 primaries matrix and the D65 reference white.
//! The constants below reproduce it to full `f64` precision; do not swap them
//! for another matrix derivation without recalibrating the thresholds.

use serde::{Deserialize, Serialize};

/// D65 reference white in CIE XYZ.
pub const D65_WHITE_POINT_XYZ: [f64; 3] = [0.95047, 1.00000, 1.08883];

/// Linear sRGB to XYZ (D65).
pub const SRGB_TO_XYZ: [[f64; 3]; 3] = [
    [0.412424, 0.357579, 0.180464],
    [0.212656, 0.715158, 0.072186],
    [0.019332, 0.119193, 0.950444],
];

/// (6/29)^3, where the CIE f(t) switches from its linear to cube-root branch.
const CIE_EPSILON: f64 = 216.0 / 24389.0;

/// A color in CIELab.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl Lab {
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }
}

/// Convert a normalized sRGB triplet (each channel in [0,1]) to CIELab.
pub fn to_lab(rgb: [f64; 3]) -> Lab {
    let linear = rgb.map(srgb_to_linear);

    let mut xyz = [0.0; 3];
    for (out, row) in xyz.iter_mut().zip(SRGB_TO_XYZ.iter()) {
        *out = row[0] * linear[0] + row[1] * linear[1] + row[2] * linear[2];
    }

    let fx = cie_f(xyz[0] / D65_WHITE_POINT_XYZ[0]);
    let fy = cie_f(xyz[1] / D65_WHITE_POINT_XYZ[1]);
    let fz = cie_f(xyz[2] / D65_WHITE_POINT_XYZ[2]);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Convert an 8-bit sRGB pixel to CIELab.
pub fn srgb8_to_lab(rgb: [u8; 3]) -> Lab {
    to_lab(rgb.map(|c| c as f64 / 255.0))
}

/// sRGB inverse companding.
#[inline]
fn srgb_to_linear(v: f64) -> f64 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn cie_f(t: f64) -> f64 {
    if t > CIE_EPSILON {
        t.cbrt()
    } else {
        // t * (29/6)^2 / 3 + 4/29
        t * (841.0 / 108.0) + 4.0 / 29.0
    }
}
