//! Reference path builder and the pipeline behind it

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};
use nalgebra::Vector2;

use track_if::TrackWidth;

use super::{InputError, RefPathError, ReferencePath, TrackBounds};
use crate::min_curv::{self, MinCurvOptimiser, MinCurvProblem};
use crate::params::RefPathParams;
use crate::raceline::build_raceline;
use crate::spline::{fit_splines, interp_widths, resample, segment_lengths, Boundary};
use crate::vel_profile::calc_velocity_profile;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Collects the inputs and options of a reference path and runs the pipeline.
///
/// ```no_run
/// # use nalgebra::Vector2;
/// # use track_if::TrackWidth;
/// # use refpath_lib::spline::Boundary;
/// # use refpath_lib::ref_path::ReferencePathBuilder;
/// # let points: Vec<Vector2<f64>> = Vec::new();
/// # let widths: Vec<TrackWidth> = Vec::new();
/// let path = ReferencePathBuilder::new(points, widths, Boundary::Closed)
///     .v_x_max_ms(20.0)
///     .a_y_max_mss(8.0)
///     .min_curv(1.5)
///     .build()?;
/// # Ok::<(), refpath_lib::ref_path::RefPathError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReferencePathBuilder {
    centre_m: Vec<Vector2<f64>>,
    widths: Vec<TrackWidth>,
    boundary: Boundary,
    params: RefPathParams,
}

/// The computed arrays of a reference path.
#[derive(Debug, Clone)]
pub struct PathProfile {
    pub closed: bool,
    pub points_m: Vec<Vector2<f64>>,
    pub heading_rad: Vec<f64>,
    pub curvature_m: Vec<f64>,
    pub velocity_ms: Vec<f64>,
    pub arc_length_m: Vec<f64>,

    /// Closed paths include the element closing the loop.
    pub el_lengths_m: Vec<f64>,

    /// Closed paths include the lap time as a final entry.
    pub passage_time_s: Vec<f64>,

    pub total_length_m: f64,
    pub total_time_s: f64,

    /// Offsets applied to the line the raceline was built from.
    pub offsets_m: Vec<f64>,

    pub intermediates: Option<TrackBounds>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReferencePathBuilder {
    /// Start a builder with default parameters.
    ///
    /// Closed centre lines must not repeat their first point at the end.
    pub fn new(centre_m: Vec<Vector2<f64>>, widths: Vec<TrackWidth>, boundary: Boundary) -> Self {
        Self {
            centre_m,
            widths,
            boundary,
            params: RefPathParams::default(),
        }
    }

    /// Replace all parameters, for example with ones loaded from a file.
    pub fn with_params(mut self, params: RefPathParams) -> Self {
        self.params = params;
        self
    }

    pub fn v_x_max_ms(mut self, v_x_max_ms: f64) -> Self {
        self.params.v_x_max_ms = v_x_max_ms;
        self
    }

    pub fn a_y_max_mss(mut self, a_y_max_mss: f64) -> Self {
        self.params.a_y_max_mss = a_y_max_mss;
        self
    }

    /// Optimise the line for minimum curvature, keeping a vehicle of the given width inside the
    /// track.
    pub fn min_curv(mut self, vehicle_width_m: f64) -> Self {
        self.params.min_curv = true;
        self.params.vehicle_width_m = Some(vehicle_width_m);
        self
    }

    /// Follow the centre line without optimisation.
    pub fn centre_line(mut self) -> Self {
        self.params.min_curv = false;
        self
    }

    pub fn resample_step_m(mut self, step_m: f64) -> Self {
        self.params.resample_step_m = step_m;
        self
    }

    pub fn interp_step_m(mut self, step_m: f64) -> Self {
        self.params.interp_step_m = step_m;
        self
    }

    pub fn kappa_bound_m(mut self, kappa_bound_m: f64) -> Self {
        self.params.kappa_bound_m = kappa_bound_m;
        self
    }

    pub fn num_subsamples(mut self, num_subsamples: usize) -> Self {
        self.params.num_subsamples = num_subsamples;
        self
    }

    pub fn compute_intermediates(mut self, compute: bool) -> Self {
        self.params.compute_intermediates = compute;
        self
    }

    pub fn solver_params(mut self, params: min_curv::Params) -> Self {
        self.params.min_curv_solver = params;
        self
    }

    pub fn params(&self) -> &RefPathParams {
        &self.params
    }

    /// Check the inputs and parameters without running the pipeline.
    pub fn validate(&self) -> Result<(), InputError> {
        let num_points = self.centre_m.len();
        if num_points < 3 {
            return Err(InputError::TooFewPoints(num_points));
        }

        if self.widths.len() != num_points {
            return Err(InputError::WidthCountMismatch {
                points: num_points,
                widths: self.widths.len(),
            });
        }

        if let Some(i) = self
            .centre_m
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite()))
        {
            return Err(InputError::NonFinitePoint(i));
        }

        if let Some(i) = self.widths.iter().position(|w| {
            !(w.right_m.is_finite() && w.left_m.is_finite() && w.right_m >= 0.0 && w.left_m >= 0.0)
        }) {
            return Err(InputError::InvalidWidth(i));
        }

        if let Boundary::Open {
            psi_s_rad,
            psi_e_rad,
        } = self.boundary
        {
            if !(psi_s_rad.is_finite() && psi_e_rad.is_finite()) {
                return Err(InputError::NonFiniteHeading);
            }
        }

        let p = &self.params;
        check_positive("v_x_max_ms", p.v_x_max_ms)?;
        check_positive("a_y_max_mss", p.a_y_max_mss)?;
        check_positive("resample_step_m", p.resample_step_m)?;
        check_positive("interp_step_m", p.interp_step_m)?;
        check_positive("kappa_bound_m", p.kappa_bound_m)?;

        if p.num_subsamples < 2 {
            return Err(InputError::InvalidSubsamples(p.num_subsamples));
        }

        if p.min_curv {
            match p.vehicle_width_m {
                None => return Err(InputError::MissingVehicleWidth),
                Some(w) if !(w.is_finite() && w >= 0.0) => {
                    return Err(InputError::InvalidParam {
                        name: "vehicle_width_m",
                        value: w,
                    })
                }
                Some(_) => (),
            }
        }

        Ok(())
    }

    /// Run the pipeline and return the computed arrays.
    pub fn run_pipeline(&self) -> Result<PathProfile, RefPathError> {
        self.validate()?;

        let p = &self.params;

        info!(
            "Building reference path from {} centre line points ({})",
            self.centre_m.len(),
            match self.boundary.is_closed() {
                true => "closed",
                false => "open",
            }
        );

        let centre_splines = fit_splines(&self.centre_m, self.boundary)?;

        // The line the raceline is built from, its widths and normals, and the offsets applied
        let (ref_points_m, ref_widths, ref_normals, offsets_m) = match p.vehicle_width_m {
            Some(vehicle_width_m) if p.min_curv => {
                let lengths = segment_lengths(&centre_splines, p.num_subsamples)?;
                let resampled = resample(&centre_splines, &lengths, p.resample_step_m)?;
                let widths = interp_widths(&self.widths, &centre_splines, &resampled)?;
                let points_m = resampled.positions();

                let ref_splines = fit_splines(&points_m, self.boundary)?;

                let solution = MinCurvOptimiser::new(p.min_curv_solver.clone()).optimise(
                    &MinCurvProblem {
                        points_m: &points_m,
                        widths: &widths,
                        splines: &ref_splines,
                        vehicle_width_m,
                        kappa_bound_m: p.kappa_bound_m,
                    },
                )?;

                (points_m, widths, ref_splines.normals, solution.offsets_m)
            }
            _ => {
                debug!("Following the centre line without optimisation");
                let offsets_m = vec![0.0; self.centre_m.len()];
                (
                    self.centre_m.clone(),
                    self.widths.clone(),
                    centre_splines.normals.clone(),
                    offsets_m,
                )
            }
        };

        let intermediates = match p.compute_intermediates {
            true => Some(track_bounds(&ref_points_m, &ref_widths, &ref_normals)),
            false => None,
        };

        let raceline = build_raceline(
            &ref_points_m,
            &ref_normals,
            &offsets_m,
            self.boundary,
            p.interp_step_m,
            p.num_subsamples,
        )?;

        let vel = calc_velocity_profile(
            &raceline.curvature_m,
            &raceline.el_lengths_m,
            raceline.is_closed(),
            p.v_x_max_ms,
            p.a_y_max_mss,
        )?;

        info!(
            "Reference path built: {} points, {:.3} m, {:.3} s",
            raceline.len(),
            raceline.total_length_m,
            vel.total_time_s
        );

        Ok(PathProfile {
            closed: raceline.is_closed(),
            points_m: raceline.points_m,
            heading_rad: raceline.heading_rad,
            curvature_m: raceline.curvature_m,
            velocity_ms: vel.velocity_ms,
            arc_length_m: raceline.arc_length_m,
            el_lengths_m: raceline.el_lengths_m,
            passage_time_s: vel.passage_time_s,
            total_length_m: raceline.total_length_m,
            total_time_s: vel.total_time_s,
            offsets_m,
            intermediates,
        })
    }

    /// Run the pipeline and build the queryable path.
    pub fn build(self) -> Result<ReferencePath, RefPathError> {
        ReferencePath::from_profile(self.run_pipeline()?)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_positive(name: &'static str, value: f64) -> Result<(), InputError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InputError::InvalidParam { name, value })
    }
}

/// Track edges from a line, its widths and its right pointing normals.
fn track_bounds(
    centre_m: &[Vector2<f64>],
    widths: &[TrackWidth],
    normals: &[Vector2<f64>],
) -> TrackBounds {
    let right_m = centre_m
        .iter()
        .zip(widths.iter())
        .zip(normals.iter())
        .map(|((p, w), n)| p + n * w.right_m)
        .collect();
    let left_m = centre_m
        .iter()
        .zip(widths.iter())
        .zip(normals.iter())
        .map(|((p, w), n)| p - n * w.left_m)
        .collect();

    TrackBounds {
        centre_m: centre_m.to_vec(),
        right_m,
        left_m,
        widths: widths.to_vec(),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};
    use track_if::primitives;

    fn arc_builder() -> ReferencePathBuilder {
        let points =
            primitives::circular_arc(Vector2::zeros(), 10.0, 0.0, 1.5 * PI, 100, true).unwrap();
        let widths = vec![TrackWidth::symmetric(1.5); points.len()];

        ReferencePathBuilder::new(
            points,
            widths,
            Boundary::Open {
                psi_s_rad: FRAC_PI_2,
                psi_e_rad: 0.0,
            },
        )
    }

    fn stadium(half_width_m: f64) -> (Vec<Vector2<f64>>, Vec<TrackWidth>) {
        // Two 30 m straights joined by 10 m radius turns, counter-clockwise
        let mut points = Vec::new();
        points.extend(
            primitives::line(Vector2::new(0.0, -10.0), Vector2::new(30.0, -10.0), 30, true, false)
                .unwrap(),
        );
        points.extend(
            primitives::circular_arc(Vector2::new(30.0, 0.0), 10.0, -FRAC_PI_2, FRAC_PI_2, 16, false)
                .unwrap(),
        );
        points.extend(
            primitives::line(Vector2::new(30.0, 10.0), Vector2::new(0.0, 10.0), 30, true, false)
                .unwrap(),
        );
        points.extend(
            primitives::circular_arc(Vector2::new(0.0, 0.0), 10.0, FRAC_PI_2, 1.5 * PI, 16, false)
                .unwrap(),
        );

        let widths = vec![TrackWidth::symmetric(half_width_m); points.len()];
        (points, widths)
    }

    #[test]
    fn test_arc_scenario() {
        let path = arc_builder().v_x_max_ms(20.0).a_y_max_mss(4.0).build().unwrap();

        let length_m = 1.5 * PI * 10.0;
        assert!((path.total_length_m() - length_m).abs() < 0.05);
        assert!(!path.is_closed());

        for k in path.curvature_m().iter() {
            assert!((k - 0.1).abs() < 2e-3);
        }
        for v in path.velocity_ms().iter() {
            assert!((v - 40.0f64.sqrt()).abs() < 0.1);
        }

        // Starts heading in +y and ends heading in +x
        assert!((path.heading_rad()[0] - FRAC_PI_2).abs() < 1e-6);
        assert!(path.heading_rad()[path.len() - 1].abs() < 1e-6);
    }

    #[test]
    fn test_intermediates() {
        let path = arc_builder().compute_intermediates(true).build().unwrap();
        let bounds = path.intermediates().unwrap();

        assert_eq!(bounds.centre_m.len(), 100);

        // Counter-clockwise arc: the right edge is outside, the left edge inside
        for ((r, l), c) in bounds.right_m.iter().zip(bounds.left_m.iter()).zip(bounds.centre_m.iter()) {
            assert!((c.norm() - 10.0).abs() < 1e-9);
            assert!((r.norm() - 11.5).abs() < 1e-3);
            assert!((l.norm() - 8.5).abs() < 1e-3);
        }

        assert!(arc_builder().build().unwrap().intermediates().is_none());
    }

    #[test]
    fn test_min_curv_closed() {
        let (points, widths) = stadium(3.0);

        let path = ReferencePathBuilder::new(points, widths, Boundary::Closed)
            .min_curv(1.0)
            .kappa_bound_m(0.3)
            .compute_intermediates(true)
            .build()
            .unwrap();

        // Offsets stay inside the track less half the vehicle width
        assert!(!path.offsets_m().is_empty());
        for a in path.offsets_m().iter() {
            assert!(a.abs() <= 2.5 + 1e-9);
        }

        let bounds = path.intermediates().unwrap();
        assert_eq!(bounds.centre_m.len(), path.offsets_m().len());

        for pair in path.passage_time_s().windows(2) {
            assert!(pair[1] > pair[0]);
        }
        for v in path.velocity_ms().iter() {
            assert!(*v > 0.0 && *v <= path.summary().max_velocity_ms);
        }
    }

    #[test]
    fn test_too_narrow_is_infeasible() {
        let (points, widths) = stadium(0.5);

        let res = ReferencePathBuilder::new(points, widths, Boundary::Closed)
            .min_curv(2.0)
            .build();

        assert!(matches!(res, Err(RefPathError::OptimisationInfeasible(_))));
    }

    #[test]
    fn test_dense_centre_line() {
        // A 600 m loop recorded every 25 cm
        let radius_m = 95.0;
        let points =
            primitives::circle(Vector2::zeros(), radius_m, 0.0, 2400, true, false).unwrap();
        let widths = vec![TrackWidth::symmetric(3.0); points.len()];

        let path = ReferencePathBuilder::new(points, widths, Boundary::Closed)
            .v_x_max_ms(30.0)
            .build()
            .unwrap();

        assert!((path.total_length_m() - 2.0 * PI * radius_m).abs() < 0.01);
        for k in path.curvature_m().iter() {
            assert!((k - 1.0 / radius_m).abs() < 1e-4);
        }
    }

    #[test]
    fn test_curvature_bound_is_infeasible() {
        // A 10 m loop would have to open up to a 20 m radius, far wider than the track allows
        let points =
            primitives::circle(Vector2::zeros(), 10.0, 0.0, 60, true, false).unwrap();
        let widths = vec![TrackWidth::symmetric(2.0); points.len()];

        let res = ReferencePathBuilder::new(points, widths, Boundary::Closed)
            .min_curv(1.0)
            .kappa_bound_m(0.05)
            .build();

        assert!(matches!(
            res,
            Err(RefPathError::OptimisationInfeasible(
                min_curv::MinCurvError::Infeasible { .. }
            ))
        ));
    }

    #[test]
    fn test_iteration_limit_diverges() {
        let (points, widths) = stadium(3.0);

        let res = ReferencePathBuilder::new(points, widths, Boundary::Closed)
            .min_curv(1.0)
            .solver_params(min_curv::Params {
                max_iter: 1,
                ..min_curv::Params::default()
            })
            .build();

        assert!(matches!(
            res,
            Err(RefPathError::OptimisationDiverged(
                min_curv::MinCurvError::Diverged { iterations: 1, .. }
            ))
        ));
    }

    #[test]
    fn test_input_errors() {
        let two = vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)];
        let res = ReferencePathBuilder::new(two, vec![TrackWidth::default(); 2], Boundary::Closed)
            .build();
        assert_eq!(
            res.unwrap_err(),
            RefPathError::InvalidInput(InputError::TooFewPoints(2))
        );

        let (points, widths) = stadium(3.0);
        let res = ReferencePathBuilder::new(points.clone(), widths[1..].to_vec(), Boundary::Closed)
            .build();
        assert!(matches!(
            res,
            Err(RefPathError::InvalidInput(InputError::WidthCountMismatch { .. }))
        ));

        let mut builder = ReferencePathBuilder::new(points.clone(), widths.clone(), Boundary::Closed);
        builder.params.min_curv = true;
        assert_eq!(builder.validate(), Err(InputError::MissingVehicleWidth));

        let res = ReferencePathBuilder::new(points.clone(), widths.clone(), Boundary::Closed)
            .v_x_max_ms(0.0)
            .build();
        assert_eq!(
            res.unwrap_err(),
            RefPathError::InvalidInput(InputError::InvalidParam {
                name: "v_x_max_ms",
                value: 0.0
            })
        );

        let mut bad_widths = widths.clone();
        bad_widths[3] = TrackWidth::new(-1.0, 1.0);
        let res = ReferencePathBuilder::new(points.clone(), bad_widths, Boundary::Closed).build();
        assert_eq!(
            res.unwrap_err(),
            RefPathError::InvalidInput(InputError::InvalidWidth(3))
        );

        let res = ReferencePathBuilder::new(
            points,
            widths,
            Boundary::Open {
                psi_s_rad: std::f64::NAN,
                psi_e_rad: 0.0,
            },
        )
        .build();
        assert_eq!(
            res.unwrap_err(),
            RefPathError::InvalidInput(InputError::NonFiniteHeading)
        );
    }

    #[test]
    fn test_acceleration_track_from_file() {
        let layout = track_if::tracks::acceleration_track(1.0).unwrap();
        let centre_line = track_if::io::CentreLine {
            points_m: layout.centre_line_m,
            widths: layout.widths,
        };

        let mut file_path = std::env::temp_dir();
        file_path.push(format!("refpath_accel_{}.csv", std::process::id()));
        track_if::io::save_centre_line(&file_path, &centre_line).unwrap();
        let loaded = track_if::io::load_centre_line(&file_path).unwrap();
        std::fs::remove_file(&file_path).ok();

        let path = ReferencePathBuilder::new(
            loaded.points_m,
            loaded.widths,
            Boundary::Open {
                psi_s_rad: FRAC_PI_2,
                psi_e_rad: FRAC_PI_2,
            },
        )
        .min_curv(1.0)
        .v_x_max_ms(15.0)
        .build()
        .unwrap();

        // Nothing to gain on a straight, so the line stays central at top speed
        for a in path.offsets_m().iter() {
            assert!(a.abs() < 1e-2);
        }
        assert!((path.total_length_m() - 150.3).abs() < 1e-3);
        assert!((path.total_time_s() - 150.3 / 15.0).abs() < 1e-2);
    }

    #[test]
    fn test_skidpad_centre_line() {
        let layout = track_if::tracks::skidpad(1.0, true).unwrap();
        let radius_m: f64 = 9.125;

        let path = ReferencePathBuilder::new(
            layout.centre_line_m,
            layout.widths,
            Boundary::Open {
                psi_s_rad: FRAC_PI_2,
                psi_e_rad: FRAC_PI_2,
            },
        )
        .v_x_max_ms(20.0)
        .a_y_max_mss(8.0)
        .build()
        .unwrap();

        let lap_m = 2.0 * PI * radius_m;
        assert!((path.total_length_m() - (40.0 + 2.0 * lap_m)).abs() < 0.02 * path.total_length_m());

        // Halfway round each circle, clockwise on the right and counter-clockwise on the left
        let index_at = |s_m: f64| {
            path.arc_length_m()
                .iter()
                .position(|&s| s >= s_m)
                .unwrap()
        };
        let right = index_at(15.0 + 0.5 * lap_m);
        let left = index_at(15.0 + 1.5 * lap_m);
        assert!((path.curvature_m()[right] + 1.0 / radius_m).abs() < 0.01);
        assert!((path.curvature_m()[left] - 1.0 / radius_m).abs() < 0.01);

        let v_circle_ms = (8.0 * radius_m).sqrt();
        assert!((path.velocity_ms()[right] - v_circle_ms).abs() < 0.5);
        assert!((path.velocity_ms()[left] - v_circle_ms).abs() < 0.5);
    }

    #[test]
    fn test_repeated_point_fails_fitting() {
        let (mut points, mut widths) = stadium(3.0);
        points.push(points[0]);
        widths.push(widths[0]);

        let res = ReferencePathBuilder::new(points, widths, Boundary::Closed).build();
        assert!(matches!(
            res,
            Err(RefPathError::NumericalFitting(
                crate::spline::SplineError::DegeneratePoints { .. }
            ))
        ));
    }
}
