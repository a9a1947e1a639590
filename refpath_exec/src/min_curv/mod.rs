//! # Minimum Curvature Optimiser
//!
//! Finds lateral offsets of a reference line which minimise the sum of squared curvatures of the
//! resulting path, subject to staying inside the track and below a curvature limit.
//!
//! Each reference point `p_i` may move along its right-pointing unit normal `n_i` by an offset
//! `alpha_i`, so the new point is `p_i + alpha_i n_i`. Positive offsets move the path to the right.
//!
//! The curvature at the start of each spline segment is linearised about the reference line:
//!
//! ```text
//! kappa(alpha) ~= kappa_ref + E alpha
//! ```
//!
//! keeping the first derivatives of the reference spline fixed and letting the second derivatives
//! follow the offsets through the knot system of the spline. The optimiser then solves the
//! quadratic program
//!
//! ```text
//! minimise    (kappa_ref + E alpha)^T (kappa_ref + E alpha)
//! subject to  -(w_left_i - W/2) <= alpha_i <= w_right_i - W/2
//!             -kappa_max <= kappa_ref + E alpha <= kappa_max
//! ```
//!
//! where `W` is the vehicle width. The QP is handed to the Clarabel interior point solver.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod params;

pub use params::Params;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Vector2};
use thiserror::Error;

use track_if::TrackWidth;

use crate::spline::{knot_second_deriv_map, SplineSet};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Inputs of one minimum curvature optimisation.
#[derive(Debug, Clone, Copy)]
pub struct MinCurvProblem<'a> {
    /// Reference points the offsets are measured from.
    pub points_m: &'a [Vector2<f64>],

    /// Track widths at each reference point.
    pub widths: &'a [TrackWidth],

    /// Spline fitted through the reference points, supplying the chord lengths, the reference
    /// derivatives and the normals.
    pub splines: &'a SplineSet,

    /// Width of the vehicle, half of which is kept clear of each track edge.
    pub vehicle_width_m: f64,

    /// Maximum absolute curvature of the optimised path.
    pub kappa_bound_m: f64,
}

/// Lateral limits on the offset of each reference point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OffsetBounds {
    /// Most negative (leftmost) allowed offset.
    pub lower_m: f64,

    /// Most positive (rightmost) allowed offset.
    pub upper_m: f64,
}

/// The linear curvature model about a reference line.
#[derive(Debug, Clone)]
pub struct CurvatureModel {
    /// Sensitivity of each segment's start curvature to each point's offset, (n x N).
    pub sensitivity: DMatrix<f64>,

    /// Curvature of the reference line at the start of each segment.
    pub kappa_ref_m: DVector<f64>,
}

/// The result of a successful optimisation.
#[derive(Debug, Clone)]
pub struct MinCurvSolution {
    /// Lateral offset of each reference point, positive to the right.
    pub offsets_m: Vec<f64>,

    /// Value of the linearised sum of squared curvatures at the solution.
    pub cost: f64,

    /// Number of solver iterations.
    pub iterations: u32,
}

/// Minimum curvature optimiser.
#[derive(Debug, Clone, Default)]
pub struct MinCurvOptimiser {
    params: Params,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MinCurvError {
    #[error(
        "Problem sizes disagree: {points} points, {widths} widths, {normals} normals and \
         {segments} spline segments"
    )]
    ProblemMismatch {
        points: usize,
        widths: usize,
        normals: usize,
        segments: usize,
    },

    #[error("The curvature bound must be positive and finite, got {0}")]
    InvalidCurvatureBound(f64),

    #[error(
        "The track at point {index} is too narrow for the vehicle ({available_m:.3} m available, \
         {vehicle_width_m:.3} m needed)"
    )]
    TrackTooNarrow {
        index: usize,
        available_m: f64,
        vehicle_width_m: f64,
    },

    #[error("The reference tangent at point {index} has zero length")]
    DegenerateTangent { index: usize },

    #[error("The spline knot system could not be solved")]
    SingularSystem,

    #[error("The optimisation problem is infeasible (solver status {status})")]
    Infeasible { status: String },

    #[error("The solver did not converge (status {status} after {iterations} iterations)")]
    Diverged { status: String, iterations: u32 },

    #[error("Offset {offset_m:.4} m at point {index} lies outside its bounds")]
    BoundViolation { index: usize, offset_m: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MinCurvOptimiser {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Solve the minimum curvature problem, returning the lateral offset of each reference point.
    pub fn optimise(&self, problem: &MinCurvProblem) -> Result<MinCurvSolution, MinCurvError> {
        problem.check_sizes()?;

        if !(problem.kappa_bound_m.is_finite() && problem.kappa_bound_m > 0.0) {
            return Err(MinCurvError::InvalidCurvatureBound(problem.kappa_bound_m));
        }

        let bounds = problem.offset_bounds()?;
        let model = linearise_curvature(problem)?;

        let num_points = bounds.len();
        let num_segments = model.kappa_ref_m.len();

        debug!(
            "Minimum curvature QP: {} offsets, {} segments, kappa bound {:.4} 1/m",
            num_points, num_segments, problem.kappa_bound_m
        );

        // Objective: alpha^T (E^T E) alpha + 2 kappa_ref^T E alpha, scaled to Clarabel's
        // (1/2) x^T P x + q^T x form
        let e = &model.sensitivity;
        let p = (e.transpose() * e) * 2.0;
        let q = (e.transpose() * &model.kappa_ref_m) * 2.0;

        let (a, b) = constraints(&model, &bounds, problem.kappa_bound_m);

        let cones = [SupportedConeT::NonnegativeConeT(b.len())];
        let settings = DefaultSettings {
            verbose: false,
            max_iter: self.params.max_iter,
            tol_feas: self.params.tol_feas,
            tol_gap_abs: self.params.tol_gap_abs,
            tol_gap_rel: self.params.tol_gap_rel,
            ..DefaultSettings::default()
        };

        let mut solver = DefaultSolver::new(
            &dense_to_csc(&p, true),
            q.as_slice(),
            &dense_to_csc(&a, false),
            b.as_slice(),
            &cones,
            settings,
        );
        solver.solve();

        let status = solver.solution.status;
        let iterations = solver.solution.iterations;
        check_status(status, iterations)?;

        let offsets_m = clamp_to_bounds(
            &solver.solution.x,
            &bounds,
            self.params.bound_tolerance_m,
        )?;

        let alpha = DVector::from_column_slice(&offsets_m);
        let kappa = model.curvature(&alpha);
        let cost = kappa.norm_squared();

        info!(
            "Minimum curvature solved in {} iterations: sum of squared curvature {:.6} -> {:.6}, \
             max offset {:.3} m",
            iterations,
            model.kappa_ref_m.norm_squared(),
            cost,
            offsets_m.iter().fold(0.0f64, |m, a| m.max(a.abs()))
        );

        Ok(MinCurvSolution {
            offsets_m,
            cost,
            iterations,
        })
    }
}

impl<'a> MinCurvProblem<'a> {
    fn check_sizes(&self) -> Result<(), MinCurvError> {
        let points = self.points_m.len();
        let mismatch = self.widths.len() != points
            || self.splines.normals.len() != points
            || self.splines.num_waypoints() != points;

        if mismatch {
            Err(MinCurvError::ProblemMismatch {
                points,
                widths: self.widths.len(),
                normals: self.splines.normals.len(),
                segments: self.splines.num_segments(),
            })
        } else {
            Ok(())
        }
    }

    /// Lateral limits on each offset, keeping half the vehicle width clear of each edge.
    pub fn offset_bounds(&self) -> Result<Vec<OffsetBounds>, MinCurvError> {
        let half_width_m = 0.5 * self.vehicle_width_m;

        self.widths
            .iter()
            .enumerate()
            .map(|(index, w)| {
                let right_m = w.right_m - half_width_m;
                let left_m = w.left_m - half_width_m;

                if right_m < 0.0 || left_m < 0.0 {
                    Err(MinCurvError::TrackTooNarrow {
                        index,
                        available_m: w.right_m + w.left_m,
                        vehicle_width_m: self.vehicle_width_m,
                    })
                } else {
                    Ok(OffsetBounds {
                        lower_m: -left_m,
                        upper_m: right_m,
                    })
                }
            })
            .collect()
    }
}

impl CurvatureModel {
    /// Linearised curvature at the start of each segment for the given offsets.
    pub fn curvature(&self, offsets_m: &DVector<f64>) -> DVector<f64> {
        &self.kappa_ref_m + &self.sensitivity * offsets_m
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the linear curvature model of the problem's reference line.
pub fn linearise_curvature(problem: &MinCurvProblem) -> Result<CurvatureModel, MinCurvError> {
    let splines = problem.splines;
    let normals = &splines.normals;
    let num_points = problem.points_m.len();
    let n = splines.num_segments();

    // Knot second derivatives as a linear map of the waypoint coordinates, shared by x and y
    let knot_map = knot_second_deriv_map(&splines.chord_lengths_m, splines.boundary)
        .map_err(|_| MinCurvError::SingularSystem)?;

    let mut sensitivity = DMatrix::<f64>::zeros(n, num_points);
    let mut kappa_ref_m = DVector::<f64>::zeros(n);

    for (i, seg) in splines.segments.iter().enumerate() {
        let d = seg.tangent(0.0);
        let dd = seg.second_deriv(0.0);

        let speed_cubed = d.norm_squared().powf(1.5);
        if speed_cubed <= std::f64::EPSILON {
            return Err(MinCurvError::DegenerateTangent { index: i });
        }

        kappa_ref_m[i] = (d.x * dd.y - d.y * dd.x) / speed_cubed;

        // Second derivative in t is `L_i^2 M_i`, and an offset moves waypoint k along n_k
        let h_sq = splines.chord_lengths_m[i] * splines.chord_lengths_m[i];
        for k in 0..num_points {
            let n_k = normals[k];
            sensitivity[(i, k)] =
                h_sq * knot_map[(i, k)] * (d.x * n_k.y - d.y * n_k.x) / speed_cubed;
        }
    }

    Ok(CurvatureModel {
        sensitivity,
        kappa_ref_m,
    })
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Stack the lateral and curvature limits into Clarabel's `A x + s = b, s >= 0` form.
fn constraints(
    model: &CurvatureModel,
    bounds: &[OffsetBounds],
    kappa_bound_m: f64,
) -> (DMatrix<f64>, DVector<f64>) {
    let num_points = bounds.len();
    let n = model.kappa_ref_m.len();
    let num_rows = 2 * num_points + 2 * n;

    let mut a = DMatrix::<f64>::zeros(num_rows, num_points);
    let mut b = DVector::<f64>::zeros(num_rows);

    for (i, bound) in bounds.iter().enumerate() {
        a[(i, i)] = 1.0;
        b[i] = bound.upper_m;

        a[(num_points + i, i)] = -1.0;
        b[num_points + i] = -bound.lower_m;
    }

    let kappa_rows = 2 * num_points;
    for i in 0..n {
        for j in 0..num_points {
            let e_ij = model.sensitivity[(i, j)];
            a[(kappa_rows + i, j)] = e_ij;
            a[(kappa_rows + n + i, j)] = -e_ij;
        }
        b[kappa_rows + i] = kappa_bound_m - model.kappa_ref_m[i];
        b[kappa_rows + n + i] = kappa_bound_m + model.kappa_ref_m[i];
    }

    (a, b)
}

/// Map the solver's exit status onto the optimiser's errors.
fn check_status(status: SolverStatus, iterations: u32) -> Result<(), MinCurvError> {
    match status {
        SolverStatus::Solved => Ok(()),
        SolverStatus::AlmostSolved => {
            warn!(
                "Minimum curvature QP only solved to reduced accuracy after {} iterations",
                iterations
            );
            Ok(())
        }
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            Err(MinCurvError::Infeasible {
                status: format!("{:?}", status),
            })
        }
        _ => Err(MinCurvError::Diverged {
            status: format!("{:?}", status),
            iterations,
        }),
    }
}

/// Pull solutions which sit marginally outside their bounds back onto them.
fn clamp_to_bounds(
    x: &[f64],
    bounds: &[OffsetBounds],
    tolerance_m: f64,
) -> Result<Vec<f64>, MinCurvError> {
    x.iter()
        .zip(bounds.iter())
        .enumerate()
        .map(|(index, (&offset_m, bound))| {
            let outside = offset_m > bound.upper_m + tolerance_m
                || offset_m < bound.lower_m - tolerance_m;

            if !offset_m.is_finite() || outside {
                Err(MinCurvError::BoundViolation { index, offset_m })
            } else {
                Ok(util::maths::clamp(offset_m, bound.lower_m, bound.upper_m))
            }
        })
        .collect()
}

/// Convert a dense matrix into compressed sparse column form, dropping exact zeros.
///
/// With `upper_triangle` set only entries on or above the diagonal are kept, as Clarabel expects
/// for the quadratic cost.
fn dense_to_csc(m: &DMatrix<f64>, upper_triangle: bool) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(m.ncols() + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    colptr.push(0);
    for c in 0..m.ncols() {
        let rows = match upper_triangle {
            true => (c + 1).min(m.nrows()),
            false => m.nrows(),
        };

        for r in 0..rows {
            let v = m[(r, c)];
            if v != 0.0 {
                rowval.push(r);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }

    CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::spline::{fit_splines, Boundary};
    use track_if::primitives;

    /// Open slalom `y = A sin(2 pi x / lambda)` with roomy symmetric widths.
    fn slalom() -> (Vec<Vector2<f64>>, SplineSet) {
        let amplitude_m = 1.0;
        let wavelength_m = 10.0;
        let k = 2.0 * std::f64::consts::PI / wavelength_m;

        let points: Vec<_> = primitives::linspace(0.0, 40.0, 41, true)
            .into_iter()
            .map(|x| Vector2::new(x, amplitude_m * (k * x).sin()))
            .collect();

        let slope_rad = (amplitude_m * k).atan();
        let splines = fit_splines(
            &points,
            Boundary::Open {
                psi_s_rad: slope_rad,
                psi_e_rad: slope_rad,
            },
        )
        .unwrap();

        (points, splines)
    }

    fn circle() -> (Vec<Vector2<f64>>, SplineSet) {
        let points =
            primitives::circle(Vector2::zeros(), 10.0, 0.0, 40, true, false).unwrap();
        let splines = fit_splines(&points, Boundary::Closed).unwrap();
        (points, splines)
    }

    #[test]
    fn test_reference_curvature() {
        let (points, splines) = circle();
        let widths = vec![TrackWidth::symmetric(2.0); points.len()];
        let problem = MinCurvProblem {
            points_m: &points,
            widths: &widths,
            splines: &splines,
            vehicle_width_m: 1.0,
            kappa_bound_m: 0.5,
        };

        let model = linearise_curvature(&problem).unwrap();
        assert_eq!(model.sensitivity.nrows(), 40);
        assert_eq!(model.sensitivity.ncols(), 40);

        for (i, k) in model.kappa_ref_m.iter().enumerate() {
            assert!((k - 0.1).abs() < 1e-3);
            assert!((k - splines.segments[i].curvature(0.0)).abs() < 1e-12);
        }

        // With no offsets the model reproduces the reference curvature
        let zero = DVector::zeros(40);
        assert_eq!(model.curvature(&zero), model.kappa_ref_m);
    }

    #[test]
    fn test_offset_bounds() {
        let (points, splines) = circle();
        let widths = vec![TrackWidth::new(2.0, 3.0); points.len()];
        let problem = MinCurvProblem {
            points_m: &points,
            widths: &widths,
            splines: &splines,
            vehicle_width_m: 1.0,
            kappa_bound_m: 0.5,
        };

        let bounds = problem.offset_bounds().unwrap();
        assert_eq!(
            bounds[0],
            OffsetBounds {
                lower_m: -2.5,
                upper_m: 1.5
            }
        );

        let mut narrow_widths = widths.clone();
        narrow_widths[7] = TrackWidth::new(0.4, 3.0);
        let narrow = MinCurvProblem {
            widths: &narrow_widths,
            ..problem
        };
        assert!(matches!(
            narrow.offset_bounds(),
            Err(MinCurvError::TrackTooNarrow { index: 7, .. })
        ));
    }

    #[test]
    fn test_slalom_reduces_curvature() {
        let (points, splines) = slalom();
        let widths = vec![TrackWidth::symmetric(3.0); points.len()];
        let problem = MinCurvProblem {
            points_m: &points,
            widths: &widths,
            splines: &splines,
            vehicle_width_m: 1.0,
            kappa_bound_m: 1.0,
        };

        let solution = MinCurvOptimiser::default().optimise(&problem).unwrap();
        assert_eq!(solution.offsets_m.len(), points.len());

        // Every offset stays inside the track
        for a in solution.offsets_m.iter() {
            assert!(*a <= 2.5 && *a >= -2.5);
        }

        // Refit through the moved points and compare the true curvature at each point
        let moved: Vec<_> = points
            .iter()
            .zip(splines.normals.iter())
            .zip(solution.offsets_m.iter())
            .map(|((p, n), a)| p + n * *a)
            .collect();
        let refit = fit_splines(&moved, splines.boundary).unwrap();

        let sum_sq = |s: &SplineSet| -> f64 {
            s.segments.iter().map(|seg| seg.curvature(0.0).powi(2)).sum()
        };

        assert!(sum_sq(&refit) < 0.5 * sum_sq(&splines));
    }

    #[test]
    fn test_too_narrow() {
        let (points, splines) = slalom();
        let widths = vec![TrackWidth::symmetric(0.5); points.len()];
        let problem = MinCurvProblem {
            points_m: &points,
            widths: &widths,
            splines: &splines,
            vehicle_width_m: 2.0,
            kappa_bound_m: 2.0,
        };

        assert!(matches!(
            MinCurvOptimiser::default().optimise(&problem),
            Err(MinCurvError::TrackTooNarrow { index: 0, .. })
        ));
    }

    #[test]
    fn test_problem_mismatch() {
        let (points, splines) = slalom();
        let widths = vec![TrackWidth::symmetric(3.0); points.len() - 1];
        let problem = MinCurvProblem {
            points_m: &points,
            widths: &widths,
            splines: &splines,
            vehicle_width_m: 1.0,
            kappa_bound_m: 2.0,
        };

        assert!(matches!(
            MinCurvOptimiser::default().optimise(&problem),
            Err(MinCurvError::ProblemMismatch { .. })
        ));

        let widths = vec![TrackWidth::symmetric(3.0); points.len()];
        let problem = MinCurvProblem {
            widths: &widths,
            kappa_bound_m: 0.0,
            ..problem
        };
        assert_eq!(
            MinCurvOptimiser::default().optimise(&problem).unwrap_err(),
            MinCurvError::InvalidCurvatureBound(0.0)
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(SolverStatus::Solved, 10).is_ok());
        assert!(check_status(SolverStatus::AlmostSolved, 10).is_ok());

        assert!(matches!(
            check_status(SolverStatus::PrimalInfeasible, 10),
            Err(MinCurvError::Infeasible { .. })
        ));
        assert_eq!(
            check_status(SolverStatus::MaxIterations, 50).unwrap_err(),
            MinCurvError::Diverged {
                status: String::from("MaxIterations"),
                iterations: 50
            }
        );
    }

    #[test]
    fn test_clamp_to_bounds() {
        let bounds = [OffsetBounds {
            lower_m: -1.0,
            upper_m: 1.0,
        }; 3];

        let clamped = clamp_to_bounds(&[0.5, 1.0005, -1.0002], &bounds, 1e-3).unwrap();
        assert_eq!(clamped, vec![0.5, 1.0, -1.0]);

        assert_eq!(
            clamp_to_bounds(&[0.0, 1.1, 0.0], &bounds, 1e-3).unwrap_err(),
            MinCurvError::BoundViolation {
                index: 1,
                offset_m: 1.1
            }
        );
    }

    #[test]
    fn test_dense_to_csc() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);

        let upper = dense_to_csc(&m, true);
        assert_eq!(upper.colptr, vec![0, 1, 3]);
        assert_eq!(upper.rowval, vec![0, 0, 1]);
        assert_eq!(upper.nzval, vec![4.0, 1.0, 3.0]);

        let full = dense_to_csc(&m, false);
        assert_eq!(full.nzval.len(), 4);
    }
}
