//! # Reference Path
//!
//! The reference path is the finely sampled line a vehicle follows around a track, together with
//! the speed and passage time at each point. It is built once from a centre line and its track
//! widths by [`ReferencePathBuilder`], after which it is immutable and can be shared between
//! threads for lookups.
//!
//! All positions are in meters in the track frame, headings are measured from the +x axis and
//! lie in (-pi, pi], and curvatures are positive for left turns.
//!
//! Closed paths are periodic: arc lengths wrap modulo the total length and times modulo the lap
//! time. Open paths clamp queries outside their range to the nearest end.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod builder;
mod interp;
mod localise;

pub use builder::*;
pub use interp::{LinearTable, TableError};
pub use localise::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use track_if::TrackWidth;
use util::maths::{unwrap_angles, wrap_to_period, wrap_to_pi};

use crate::min_curv::MinCurvError;
use crate::raceline::RacelineError;
use crate::spline::{ResampleError, SplineError};
use crate::vel_profile::VelProfileError;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An immutable reference path.
#[derive(Debug, Clone)]
pub struct ReferencePath {
    profile: PathProfile,

    x_of_s: LinearTable,
    y_of_s: LinearTable,
    heading_of_s: LinearTable,
    velocity_of_s: LinearTable,
    time_of_s: LinearTable,
    x_of_t: LinearTable,
    y_of_t: LinearTable,
}

/// The track edges around the line the raceline offsets were measured from.
#[derive(Debug, Clone, Serialize)]
pub struct TrackBounds {
    pub centre_m: Vec<Vector2<f64>>,
    pub right_m: Vec<Vector2<f64>>,
    pub left_m: Vec<Vector2<f64>>,
    pub widths: Vec<TrackWidth>,
}

/// One row of the tabulated path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefPathRecord {
    pub s_m: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub heading_rad: f64,
    pub curvature_m: f64,
    pub velocity_ms: f64,
    pub time_s: f64,
}

/// Overall figures of a reference path.
#[derive(Debug, Clone, Serialize)]
pub struct RefPathSummary {
    pub closed: bool,
    pub num_points: usize,
    pub total_length_m: f64,
    pub total_time_s: f64,
    pub min_velocity_ms: f64,
    pub max_velocity_ms: f64,
    pub max_abs_curvature_m: f64,
    pub max_abs_offset_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised while building or querying a reference path.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RefPathError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("Spline fitting failed: {0}")]
    NumericalFitting(#[from] SplineError),

    #[error("Resampling failed: {0}")]
    Resample(#[from] ResampleError),

    #[error("The minimum curvature problem is infeasible: {0}")]
    OptimisationInfeasible(MinCurvError),

    #[error("The minimum curvature optimisation failed: {0}")]
    OptimisationDiverged(MinCurvError),

    #[error("Velocity profile failed: {0}")]
    VelocityProfile(#[from] VelProfileError),

    #[error("The path profile cannot be tabulated: {0}")]
    Profile(#[from] TableError),

    #[error(
        "Cannot localise with guess {guess_m:.3} m and tolerance {tolerance_m:.3} m ({reason:?})"
    )]
    LocalisationOutOfRange {
        guess_m: f64,
        tolerance_m: f64,
        reason: OutOfRange,
    },
}

/// Problems with the inputs to the builder or to a query.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("At least 3 centre line points are needed, got {0}")]
    TooFewPoints(usize),

    #[error("Got {points} centre line points but {widths} track widths")]
    WidthCountMismatch { points: usize, widths: usize },

    #[error("Centre line point {0} is not finite")]
    NonFinitePoint(usize),

    #[error("Track width {0} is negative or not finite")]
    InvalidWidth(usize),

    #[error("Boundary headings must be finite")]
    NonFiniteHeading,

    #[error("Parameter {name} must be positive and finite, got {value}")]
    InvalidParam { name: &'static str, value: f64 },

    #[error("At least 2 subsamples per segment are required, got {0}")]
    InvalidSubsamples(usize),

    #[error("Minimum curvature optimisation needs the vehicle width")]
    MissingVehicleWidth,

    #[error("Query argument {name} is invalid ({value})")]
    InvalidQuery { name: &'static str, value: f64 },

    #[error("Got {offsets} offsets for {points} points")]
    OffsetCountMismatch { points: usize, offsets: usize },

    #[error("The optimiser rejected the problem: {0}")]
    OptimiserSetup(MinCurvError),
}

/// Why a position could not be localised on an open path.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum OutOfRange {
    /// The search window does not overlap the path.
    WindowOutsidePath,

    /// The position projects before the start of the path.
    BeforeStart,

    /// The position projects beyond the end of the path.
    PastEnd,

    /// The position projects outside the search window.
    OutsideWindow,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReferencePath {
    /// Tabulate a computed path profile.
    pub fn from_profile(profile: PathProfile) -> Result<Self, RefPathError> {
        let num_points = profile.points_m.len();
        if num_points < 2 {
            return Err(TableError::TooFewKnots(num_points).into());
        }

        let mut s_knots = profile.arc_length_m.clone();
        let mut xs: Vec<f64> = profile.points_m.iter().map(|p| p.x).collect();
        let mut ys: Vec<f64> = profile.points_m.iter().map(|p| p.y).collect();
        let mut headings = unwrap_angles(&profile.heading_rad);
        let mut velocities = profile.velocity_ms.clone();

        // Closed paths get an extra knot at the total length holding the start values, with the
        // heading continued across the seam
        if profile.closed {
            s_knots.push(profile.total_length_m);
            xs.push(xs[0]);
            ys.push(ys[0]);

            let seam_rad =
                wrap_to_pi(profile.heading_rad[0] - profile.heading_rad[num_points - 1]);
            headings.push(headings[num_points - 1] + seam_rad);

            velocities.push(velocities[0]);
        }

        let times = profile.passage_time_s.clone();

        Ok(Self {
            x_of_s: LinearTable::new(s_knots.clone(), xs.clone())?,
            y_of_s: LinearTable::new(s_knots.clone(), ys.clone())?,
            heading_of_s: LinearTable::new(s_knots.clone(), headings)?,
            velocity_of_s: LinearTable::new(s_knots.clone(), velocities)?,
            time_of_s: LinearTable::new(s_knots, times.clone())?,
            x_of_t: LinearTable::new(times.clone(), xs)?,
            y_of_t: LinearTable::new(times, ys)?,
            profile,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.profile.closed
    }

    /// Number of points in the path.
    pub fn len(&self) -> usize {
        self.profile.points_m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profile.points_m.is_empty()
    }

    pub fn profile(&self) -> &PathProfile {
        &self.profile
    }

    pub fn points_m(&self) -> &[Vector2<f64>] {
        &self.profile.points_m
    }

    pub fn heading_rad(&self) -> &[f64] {
        &self.profile.heading_rad
    }

    pub fn curvature_m(&self) -> &[f64] {
        &self.profile.curvature_m
    }

    pub fn velocity_ms(&self) -> &[f64] {
        &self.profile.velocity_ms
    }

    pub fn arc_length_m(&self) -> &[f64] {
        &self.profile.arc_length_m
    }

    pub fn el_lengths_m(&self) -> &[f64] {
        &self.profile.el_lengths_m
    }

    /// Passage time of each point. Closed paths have one extra entry holding the lap time.
    pub fn passage_time_s(&self) -> &[f64] {
        &self.profile.passage_time_s
    }

    pub fn total_length_m(&self) -> f64 {
        self.profile.total_length_m
    }

    pub fn total_time_s(&self) -> f64 {
        self.profile.total_time_s
    }

    /// Lateral offsets applied to the reference line, all zero unless the path was optimised.
    pub fn offsets_m(&self) -> &[f64] {
        &self.profile.offsets_m
    }

    pub fn intermediates(&self) -> Option<&TrackBounds> {
        self.profile.intermediates.as_ref()
    }

    pub fn position_at_arc_length(&self, s_m: f64) -> Vector2<f64> {
        let s_m = self.wrap_arc_length(s_m);
        Vector2::new(self.x_of_s.eval(s_m), self.y_of_s.eval(s_m))
    }

    pub fn heading_at_arc_length(&self, s_m: f64) -> f64 {
        wrap_to_pi(self.heading_of_s.eval(self.wrap_arc_length(s_m)))
    }

    pub fn velocity_at_arc_length(&self, s_m: f64) -> f64 {
        self.velocity_of_s.eval(self.wrap_arc_length(s_m))
    }

    /// Passage time at an arc length. For closed paths this lies in `[0, lap time)`.
    pub fn time_at_arc_length(&self, s_m: f64) -> f64 {
        let t_s = self.time_of_s.eval(self.wrap_arc_length(s_m));
        self.wrap_time(t_s)
    }

    pub fn position_at_time(&self, t_s: f64) -> Vector2<f64> {
        let t_s = self.wrap_time(t_s);
        Vector2::new(self.x_of_t.eval(t_s), self.y_of_t.eval(t_s))
    }

    /// The path as one record per point.
    pub fn records(&self) -> Vec<RefPathRecord> {
        let p = &self.profile;

        (0..p.points_m.len())
            .map(|i| RefPathRecord {
                s_m: p.arc_length_m[i],
                x_m: p.points_m[i].x,
                y_m: p.points_m[i].y,
                heading_rad: p.heading_rad[i],
                curvature_m: p.curvature_m[i],
                velocity_ms: p.velocity_ms[i],
                time_s: p.passage_time_s[i],
            })
            .collect()
    }

    pub fn summary(&self) -> RefPathSummary {
        let p = &self.profile;
        let abs_max = |v: &[f64]| v.iter().fold(0.0f64, |m, x| m.max(x.abs()));

        RefPathSummary {
            closed: p.closed,
            num_points: p.points_m.len(),
            total_length_m: p.total_length_m,
            total_time_s: p.total_time_s,
            min_velocity_ms: p
                .velocity_ms
                .iter()
                .cloned()
                .fold(std::f64::INFINITY, f64::min),
            max_velocity_ms: p.velocity_ms.iter().cloned().fold(0.0, f64::max),
            max_abs_curvature_m: abs_max(&p.curvature_m),
            max_abs_offset_m: abs_max(&p.offsets_m),
        }
    }

    fn wrap_arc_length(&self, s_m: f64) -> f64 {
        match self.profile.closed {
            true => wrap_to_period(s_m, self.profile.total_length_m),
            false => s_m,
        }
    }

    fn wrap_time(&self, t_s: f64) -> f64 {
        match self.profile.closed {
            true => wrap_to_period(t_s, self.profile.total_time_s),
            false => t_s,
        }
    }
}

impl From<MinCurvError> for RefPathError {
    fn from(e: MinCurvError) -> Self {
        match e {
            MinCurvError::TrackTooNarrow { .. } | MinCurvError::Infeasible { .. } => {
                RefPathError::OptimisationInfeasible(e)
            }
            MinCurvError::Diverged { .. } | MinCurvError::BoundViolation { .. } => {
                RefPathError::OptimisationDiverged(e)
            }
            MinCurvError::SingularSystem => {
                RefPathError::NumericalFitting(SplineError::SingularSystem)
            }
            MinCurvError::DegenerateTangent { index } => {
                RefPathError::NumericalFitting(SplineError::DegeneratePoints { index })
            }
            MinCurvError::ProblemMismatch { .. } | MinCurvError::InvalidCurvatureBound(_) => {
                RefPathError::InvalidInput(InputError::OptimiserSetup(e))
            }
        }
    }
}

impl From<RacelineError> for RefPathError {
    fn from(e: RacelineError) -> Self {
        match e {
            RacelineError::Spline(e) => RefPathError::NumericalFitting(e),
            RacelineError::Resample(e) => RefPathError::Resample(e),
            RacelineError::LengthMismatch {
                points, offsets, ..
            } => RefPathError::InvalidInput(InputError::OffsetCountMismatch { points, offsets }),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
