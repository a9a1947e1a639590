//! # Spline Fitting
//!
//! Fits C2-continuous cubic splines through a set of waypoints.
//!
//! The spline is parameterised by chord length, so that in terms of `u = t L_i` the curve is an
//! ordinary cubic spline with knot spacings `L_i`. Its unknowns are the second derivatives `M_k`
//! at the knots, which satisfy the tridiagonal system
//!
//! ```text
//! L_{k-1} M_{k-1} + 2 (L_{k-1} + L_k) M_k + L_k M_{k+1} = 6 (s_k - s_{k-1})
//! ```
//!
//! with `s_k = (y_{k+1} - y_k) / L_k` the slope of chord `k`. Closed paths wrap the indices,
//! which makes the system cyclic. Open paths replace the first and last rows by the boundary
//! headings, fixing the unit tangent at both ends. Both coordinates share one factorisation.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::{DMatrix, Vector2};
use thiserror::Error;

use super::tridiag::Tridiagonal;
use super::{right_normal, right_normal_from_heading, Boundary, Cubic, SplineSegment, SplineSet};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Minimum number of waypoints needed to fit a spline.
pub const MIN_NUM_WAYPOINTS: usize = 3;

/// Chords shorter than this are treated as repeated waypoints.
pub const MIN_CHORD_LENGTH_M: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors that can occur while fitting a spline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplineError {
    #[error("At least 3 waypoints are needed to fit a spline, got {0}")]
    TooFewPoints(usize),

    #[error("Waypoint {0} is not finite")]
    NonFinitePoint(usize),

    #[error("Boundary heading {0} is not finite")]
    NonFiniteHeading(f64),

    #[error("Waypoint {index} coincides with the next waypoint")]
    DegeneratePoints { index: usize },

    #[error("The spline system is singular and cannot be solved")]
    SingularSystem,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Fit a spline through the given waypoints.
///
/// Closed paths must not repeat the first waypoint at the end. Open paths use the boundary
/// headings to fix the tangent direction at the first and last waypoints, with a magnitude equal to
/// the first and last chord lengths.
pub fn fit_splines(
    points_m: &[Vector2<f64>],
    boundary: Boundary,
) -> Result<SplineSet, SplineError> {
    if points_m.len() < MIN_NUM_WAYPOINTS {
        return Err(SplineError::TooFewPoints(points_m.len()));
    }

    if let Some(i) = points_m
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite()))
    {
        return Err(SplineError::NonFinitePoint(i));
    }

    if let Boundary::Open {
        psi_s_rad,
        psi_e_rad,
    } = boundary
    {
        for psi in [psi_s_rad, psi_e_rad].iter() {
            if !psi.is_finite() {
                return Err(SplineError::NonFiniteHeading(*psi));
            }
        }
    }

    let chords = chord_lengths(points_m, boundary)?;
    let num_segments = chords.len();

    let lu = knot_system(&chords, boundary)
        .factorise()
        .map_err(|_| SplineError::SingularSystem)?;

    let (xs, ys): (Vec<f64>, Vec<f64>) = points_m.iter().map(|p| (p.x, p.y)).unzip();
    let (slopes_x, slopes_y) = match boundary {
        Boundary::Closed => (None, None),
        Boundary::Open {
            psi_s_rad,
            psi_e_rad,
        } => (
            Some((psi_s_rad.cos(), psi_e_rad.cos())),
            Some((psi_s_rad.sin(), psi_e_rad.sin())),
        ),
    };

    let m_x = lu
        .solve(&knot_rhs(&xs, &chords, slopes_x))
        .map_err(|_| SplineError::SingularSystem)?;
    let m_y = lu
        .solve(&knot_rhs(&ys, &chords, slopes_y))
        .map_err(|_| SplineError::SingularSystem)?;

    if m_x.iter().chain(m_y.iter()).any(|m| !m.is_finite()) {
        return Err(SplineError::SingularSystem);
    }

    let segments: Vec<SplineSegment> = (0..num_segments)
        .map(|i| SplineSegment {
            x: segment_cubic(&xs, &m_x, &chords, i),
            y: segment_cubic(&ys, &m_y, &chords, i),
        })
        .collect();

    // One normal per waypoint, from the tangent at the start of each segment
    let mut normals = Vec::with_capacity(points_m.len());
    for (i, seg) in segments.iter().enumerate() {
        match right_normal(&seg.tangent(0.0)) {
            Some(n) => normals.push(n),
            None => return Err(SplineError::DegeneratePoints { index: i }),
        }
    }
    if let Boundary::Open { psi_e_rad, .. } = boundary {
        normals.push(right_normal_from_heading(psi_e_rad));
    }

    trace!(
        "Fitted {} spline segments through {} waypoints ({:?})",
        num_segments,
        points_m.len(),
        boundary
    );

    Ok(SplineSet {
        segments,
        normals,
        chord_lengths_m: chords,
        boundary,
    })
}

/// Chord length of each segment of the path.
///
/// A closed path has one chord per waypoint, an open one a chord less.
pub fn chord_lengths(
    points_m: &[Vector2<f64>],
    boundary: Boundary,
) -> Result<Vec<f64>, SplineError> {
    let num_points = points_m.len();
    let num_segments = match boundary {
        Boundary::Closed => num_points,
        Boundary::Open { .. } => num_points.saturating_sub(1),
    };

    (0..num_segments)
        .map(|i| {
            let length = (points_m[(i + 1) % num_points] - points_m[i]).norm();
            if length < MIN_CHORD_LENGTH_M {
                Err(SplineError::DegeneratePoints { index: i })
            } else {
                Ok(length)
            }
        })
        .collect()
}

/// The tridiagonal system for the knot second derivatives, one row per waypoint.
///
/// See the module documentation for the rows.
pub fn knot_system(chords_m: &[f64], boundary: Boundary) -> Tridiagonal {
    let n = chords_m.len();

    match boundary {
        Boundary::Closed => Tridiagonal {
            lower: (0..n).map(|k| chords_m[(k + n - 1) % n]).collect(),
            diag: (0..n)
                .map(|k| 2.0 * (chords_m[(k + n - 1) % n] + chords_m[k]))
                .collect(),
            upper: chords_m.to_vec(),
            cyclic: true,
        },
        Boundary::Open { .. } => {
            let mut lower = vec![0.0; n + 1];
            let mut diag = vec![0.0; n + 1];
            let mut upper = vec![0.0; n + 1];

            for k in 0..=n {
                if k > 0 {
                    lower[k] = chords_m[k - 1];
                    diag[k] += 2.0 * chords_m[k - 1];
                }
                if k < n {
                    upper[k] = chords_m[k];
                    diag[k] += 2.0 * chords_m[k];
                }
            }

            Tridiagonal {
                lower,
                diag,
                upper,
                cyclic: false,
            }
        }
    }
}

/// Map from waypoint coordinates to knot second derivatives, `M = T y + const`.
///
/// The matrix is the same for both coordinates. Column `k` is the response of every knot to a
/// unit move of waypoint `k`, found with one banded solve per waypoint.
pub fn knot_second_deriv_map(
    chords_m: &[f64],
    boundary: Boundary,
) -> Result<DMatrix<f64>, SplineError> {
    let system = knot_system(chords_m, boundary);
    let num_knots = system.len();
    let lu = system
        .factorise()
        .map_err(|_| SplineError::SingularSystem)?;

    // End slopes are constant and drop out of the map
    let end_slopes = match boundary {
        Boundary::Closed => None,
        Boundary::Open { .. } => Some((0.0, 0.0)),
    };

    let mut map = DMatrix::<f64>::zeros(num_knots, num_knots);
    let mut unit = vec![0.0; num_knots];

    for k in 0..num_knots {
        unit[k] = 1.0;
        let column = lu
            .solve(&knot_rhs(&unit, chords_m, end_slopes))
            .map_err(|_| SplineError::SingularSystem)?;
        unit[k] = 0.0;

        for (i, m) in column.iter().enumerate() {
            map[(i, k)] = *m;
        }
    }

    Ok(map)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Right hand side of the knot system for one coordinate.
///
/// `end_slopes` holds the start and end unit tangent components of an open path, and must be
/// `None` for a closed one.
fn knot_rhs(values: &[f64], chords_m: &[f64], end_slopes: Option<(f64, f64)>) -> Vec<f64> {
    let n = chords_m.len();
    let slope = |i: usize| (values[(i + 1) % values.len()] - values[i]) / chords_m[i];

    match end_slopes {
        None => (0..n)
            .map(|k| 6.0 * (slope(k) - slope((k + n - 1) % n)))
            .collect(),
        Some((start, end)) => (0..=n)
            .map(|k| {
                let after = if k < n { slope(k) } else { end };
                let before = if k > 0 { slope(k - 1) } else { start };
                6.0 * (after - before)
            })
            .collect(),
    }
}

/// Cubic of segment `i` in the local parameter `t`, from the knot values and second derivatives.
fn segment_cubic(values: &[f64], knot_m: &[f64], chords_m: &[f64], i: usize) -> Cubic {
    let j = (i + 1) % values.len();
    let h_sq = chords_m[i] * chords_m[i];

    Cubic::new(
        values[i],
        values[j] - values[i] - h_sq * (2.0 * knot_m[i] + knot_m[j]) / 6.0,
        0.5 * h_sq * knot_m[i],
        h_sq * (knot_m[j] - knot_m[i]) / 6.0,
    )
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
