//! Four-point projective warp.
//!
//! The source rectangle's corners (top-left, top-right, bottom-right,
//! bottom-left) are mapped onto the supplied destination points. The output
//! canvas spans from the origin to the farthest destination coordinate;
//! anything the warped quad does not cover is transparent.

use super::transform::warp;
use super::{ImagingError, Points, Surface};
use image::Rgba;

/// Pivots smaller than this make the system singular.
const PIVOT_EPSILON: f64 = 1e-12;
/// Twice the triangle area below which three corners count as collinear.
const COLLINEAR_EPSILON: f64 = 1e-9;

/// A 3x3 projective transform with `h[8] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography([f64; 9]);

impl Homography {
    /// Solve for the transform taking each `from[i]` to `to[i]`.
    pub fn from_correspondences(from: &[[f64; 2]; 4], to: &[[f64; 2]; 4]) -> Option<Self> {
        let mut system = [[0.0f64; 9]; 8];
        for (i, (&[x, y], &[u, v])) in from.iter().zip(to).enumerate() {
            system[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, u];
            system[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, v];
        }
        let h = solve(system)?;
        Some(Self([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0]))
    }

    /// Map a point. Points on the line at infinity come back non-finite.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let h = &self.0;
        let w = h[6] * x + h[7] * y + h[8];
        if w.abs() < PIVOT_EPSILON {
            return (f64::NAN, f64::NAN);
        }
        (
            (h[0] * x + h[1] * y + h[2]) / w,
            (h[3] * x + h[4] * y + h[5]) / w,
        )
    }
}

/// Gaussian elimination with partial pivoting on an augmented 8x9 system.
fn solve(mut m: [[f64; 9]; 8]) -> Option<[f64; 8]> {
    for col in 0..8 {
        let pivot = (col..8).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        m.swap(col, pivot);

        for row in col + 1..8 {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..9 {
                m[row][k] -= factor * m[col][k];
            }
        }
    }

    let mut x = [0.0f64; 8];
    for row in (0..8).rev() {
        let tail: f64 = (row + 1..8).map(|k| m[row][k] * x[k]).sum();
        x[row] = (m[row][8] - tail) / m[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}

fn validate_corners(points: &Points) -> Result<[[f64; 2]; 4], ImagingError> {
    let pairs = points.to_pairs().ok_or_else(|| {
        ImagingError::InvalidPerspectivePoints("odd number of coordinates".into())
    })?;
    let corners: [[f64; 2]; 4] = pairs.as_slice().try_into().map_err(|_| {
        ImagingError::InvalidPerspectivePoints(format!(
            "expected four corners, got {}",
            pairs.len()
        ))
    })?;

    if corners.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ImagingError::InvalidPerspectivePoints(
            "corner coordinates must be finite".into(),
        ));
    }

    for [i, j, k] in [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]] {
        let (a, b, c) = (corners[i], corners[j], corners[k]);
        let cross = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
        if cross.abs() < COLLINEAR_EPSILON {
            return Err(ImagingError::InvalidPerspectivePoints(
                "three corners are collinear".into(),
            ));
        }
    }

    Ok(corners)
}

/// Warp `surface` so its corners land on `points` (TL, TR, BR, BL).
pub fn perspective(surface: Surface, points: &Points) -> Result<Surface, ImagingError> {
    let corners = validate_corners(points)?;

    let max_x = corners.iter().map(|p| p[0]).fold(f64::MIN, f64::max);
    let max_y = corners.iter().map(|p| p[1]).fold(f64::MIN, f64::max);
    if max_x <= 0.0 || max_y <= 0.0 || max_x > u32::MAX as f64 || max_y > u32::MAX as f64 {
        return Err(ImagingError::InvalidPerspectivePoints(format!(
            "corners span an unusable canvas ({max_x}, {max_y})"
        )));
    }
    let (out_w, out_h) = (max_x.ceil() as u32, max_y.ceil() as u32);

    let (w, h) = (surface.width() as f64, surface.height() as f64);
    let source = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];
    // Inverse map: destination canvas → source surface
    let inverse = Homography::from_correspondences(&corners, &source).ok_or_else(|| {
        ImagingError::InvalidPerspectivePoints("corners do not define a projective map".into())
    })?;

    warp(surface.as_rgba(), out_w, out_h, Rgba([0, 0, 0, 0]), |x, y| {
        let (u, v) = inverse.apply(x + 0.5, y + 0.5);
        (u - 0.5, v - 0.5)
    })
}
