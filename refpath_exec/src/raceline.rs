//! # Raceline
//!
//! Builds the final path by moving each reference point along its normal, refitting a spline
//! through the moved points and sampling it finely with heading and curvature at every sample.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector2;
use thiserror::Error;

use crate::spline::{
    fit_splines, resample, segment_lengths, Boundary, ResampleError, Resampled, SplineError,
    SplineSet,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A finely sampled path with its local geometry.
#[derive(Debug, Clone)]
pub struct Raceline {
    pub points_m: Vec<Vector2<f64>>,

    /// Heading at each point, angle of the tangent to the +x axis in (-pi, pi].
    pub heading_rad: Vec<f64>,

    /// Signed curvature at each point, positive for a left turn.
    pub curvature_m: Vec<f64>,

    /// Arc length of each point, starting at 0.
    pub arc_length_m: Vec<f64>,

    /// Length of each element between consecutive points. Closed paths include the element from
    /// the last point back to the first, so there are as many elements as points.
    pub el_lengths_m: Vec<f64>,

    /// Total length of the path, including the closing element of a closed path.
    pub total_length_m: f64,

    /// The spline the points were sampled from.
    pub splines: SplineSet,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RacelineError {
    #[error("Expected one normal and one offset per point ({points} points, {normals} normals, {offsets} offsets)")]
    LengthMismatch {
        points: usize,
        normals: usize,
        offsets: usize,
    },

    #[error("Could not fit the raceline spline: {0}")]
    Spline(#[from] SplineError),

    #[error("Could not resample the raceline: {0}")]
    Resample(#[from] ResampleError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Raceline {
    pub fn len(&self) -> usize {
        self.points_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points_m.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.splines.is_closed()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build a raceline from a reference line and per-point lateral offsets.
///
/// The moved points `p_i + offsets_i n_i` are refitted with the given boundary and resampled at
/// `step_m`.
pub fn build_raceline(
    reference_m: &[Vector2<f64>],
    normals: &[Vector2<f64>],
    offsets_m: &[f64],
    boundary: Boundary,
    step_m: f64,
    num_subsamples: usize,
) -> Result<Raceline, RacelineError> {
    if normals.len() != reference_m.len() || offsets_m.len() != reference_m.len() {
        return Err(RacelineError::LengthMismatch {
            points: reference_m.len(),
            normals: normals.len(),
            offsets: offsets_m.len(),
        });
    }

    let moved: Vec<Vector2<f64>> = reference_m
        .iter()
        .zip(normals.iter())
        .zip(offsets_m.iter())
        .map(|((p, n), a)| p + n * *a)
        .collect();

    let splines = fit_splines(&moved, boundary)?;
    let lengths = segment_lengths(&splines, num_subsamples)?;
    let resampled = resample(&splines, &lengths, step_m)?;

    let (heading_rad, curvature_m) = heading_curvature(&splines, &resampled);

    let arc_length_m = resampled.arc_lengths();
    let mut el_lengths_m: Vec<f64> = arc_length_m.windows(2).map(|w| w[1] - w[0]).collect();
    if resampled.closed {
        let last = arc_length_m.last().copied().unwrap_or(0.0);
        el_lengths_m.push(resampled.total_length_m - last);
    }

    debug!(
        "Raceline built: {} points over {:.3} m",
        resampled.len(),
        resampled.total_length_m
    );

    Ok(Raceline {
        points_m: resampled.positions(),
        heading_rad,
        curvature_m,
        arc_length_m,
        el_lengths_m,
        total_length_m: resampled.total_length_m,
        splines,
    })
}

/// Heading and curvature of the spline at each resampled point.
pub fn heading_curvature(splines: &SplineSet, resampled: &Resampled) -> (Vec<f64>, Vec<f64>) {
    resampled
        .points
        .iter()
        .map(|p| {
            let seg = &splines.segments[p.segment];
            (seg.heading(p.t), seg.curvature(p.t))
        })
        .unzip()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};
    use track_if::primitives;

    #[test]
    fn test_circle_raceline() {
        let points = primitives::circle(Vector2::zeros(), 10.0, 0.0, 50, true, false).unwrap();
        let reference = fit_splines(&points, Boundary::Closed).unwrap();
        let offsets = vec![0.0; points.len()];

        let raceline = build_raceline(
            &points,
            &reference.normals,
            &offsets,
            Boundary::Closed,
            0.1,
            100,
        )
        .unwrap();

        assert!(raceline.is_closed());
        assert_eq!(raceline.el_lengths_m.len(), raceline.len());
        assert!((raceline.total_length_m - 2.0 * PI * 10.0).abs() < 1e-2);

        let el_sum: f64 = raceline.el_lengths_m.iter().sum();
        assert!((el_sum - raceline.total_length_m).abs() < 1e-9);

        // Counter-clockwise travel is a constant left turn
        for k in raceline.curvature_m.iter() {
            assert!((k - 0.1).abs() < 1e-3);
        }

        // Starting at angle 0 the path heads in +y
        assert!((raceline.heading_rad[0] - FRAC_PI_2).abs() < 1e-3);
    }

    #[test]
    fn test_offsets_move_path() {
        let points = primitives::circle(Vector2::zeros(), 10.0, 0.0, 50, true, false).unwrap();
        let reference = fit_splines(&points, Boundary::Closed).unwrap();

        // Right normals point out of a counter-clockwise circle
        let offsets = vec![1.0; points.len()];
        let raceline = build_raceline(
            &points,
            &reference.normals,
            &offsets,
            Boundary::Closed,
            0.5,
            100,
        )
        .unwrap();

        for p in raceline.points_m.iter() {
            assert!((p.norm() - 11.0).abs() < 1e-2);
        }
        assert!((raceline.total_length_m - 2.0 * PI * 11.0).abs() < 2e-2);
    }

    #[test]
    fn test_open_raceline() {
        let points: Vec<_> = primitives::linspace(0.0, 30.0, 7, true)
            .into_iter()
            .map(|y| Vector2::new(0.0, y))
            .collect();
        let boundary = Boundary::Open {
            psi_s_rad: FRAC_PI_2,
            psi_e_rad: FRAC_PI_2,
        };
        let reference = fit_splines(&points, boundary).unwrap();
        let offsets = vec![0.0; points.len()];

        let raceline =
            build_raceline(&points, &reference.normals, &offsets, boundary, 0.1, 100).unwrap();

        // Both ends are included
        let last = raceline.len() - 1;
        assert!((raceline.total_length_m - 30.0).abs() < 1e-9);
        assert_eq!(last, (raceline.total_length_m / 0.1).ceil() as usize);
        assert_eq!(raceline.el_lengths_m.len(), last);
        assert!((raceline.arc_length_m[last] - 30.0).abs() < 1e-9);
        assert!((raceline.points_m[last] - Vector2::new(0.0, 30.0)).norm() < 1e-9);

        for (h, k) in raceline.heading_rad.iter().zip(raceline.curvature_m.iter()) {
            assert!((h - FRAC_PI_2).abs() < 1e-9);
            assert!(k.abs() < 1e-9);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let points = vec![Vector2::new(0.0, 0.0); 4];
        let normals = vec![Vector2::new(0.0, 1.0); 3];

        assert_eq!(
            build_raceline(&points, &normals, &[0.0; 4], Boundary::Closed, 0.1, 100).unwrap_err(),
            RacelineError::LengthMismatch {
                points: 4,
                normals: 3,
                offsets: 4
            }
        );
    }
}
