//! # Spline Module
//!
//! Piecewise cubic curves through ordered 2D waypoints. Each segment joins two consecutive
//! waypoints and is parameterised by a local `t` in `[0, 1]`, with one cubic for x and one for y.
//!
//! The segments are chord-length scaled: the derivatives of segment `i` with respect to `t` are
//! the derivatives with respect to arc length multiplied by `L_i` (first derivative) and `L_i^2`
//! (second derivative), where `L_i` is the chord length between the segment's waypoints. This
//! keeps the curve smooth in space even when the waypoint spacing varies.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Fitting of the spline segments through waypoints
pub mod fit;

/// Arc length estimation and resampling of a fitted spline
pub mod resample;

/// Banded solver for the knot systems of the fit
pub mod tridiag;

pub use fit::*;
pub use resample::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Coefficients of the cubic `a + b t + c t^2 + d t^3`, stored as `[a, b, c, d]`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cubic {
    pub coeffs: [f64; 4],
}

/// One segment of a spline, joining waypoint `i` to waypoint `i + 1`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SplineSegment {
    pub x: Cubic,
    pub y: Cubic,
}

/// A complete spline through a set of waypoints.
#[derive(Debug, Clone)]
pub struct SplineSet {
    /// Segments in order of travel. Closed splines have one segment per waypoint, the last one
    /// joining the last waypoint back to the first. Open splines have one segment less than the
    /// number of waypoints.
    pub segments: Vec<SplineSegment>,

    /// Unit normal at each waypoint, pointing to the right of the direction of travel.
    pub normals: Vec<Vector2<f64>>,

    /// Chord length of each segment, used to scale the joint conditions.
    pub chord_lengths_m: Vec<f64>,

    /// Boundary condition the spline was fitted with.
    pub boundary: Boundary,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The boundary condition of a path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Boundary {
    /// The path is a loop, the last waypoint connects back to the first.
    Closed,

    /// The path has two ends, with fixed headings at the start and end.
    ///
    /// Headings are measured from the +x axis, counter-clockwise positive.
    Open { psi_s_rad: f64, psi_e_rad: f64 },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Cubic {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            coeffs: [a, b, c, d],
        }
    }

    pub fn value(&self, t: f64) -> f64 {
        let [a, b, c, d] = self.coeffs;
        a + t * (b + t * (c + t * d))
    }

    pub fn deriv(&self, t: f64) -> f64 {
        let [_, b, c, d] = self.coeffs;
        b + t * (2.0 * c + 3.0 * d * t)
    }

    pub fn deriv2(&self, t: f64) -> f64 {
        let [_, _, c, d] = self.coeffs;
        2.0 * c + 6.0 * d * t
    }
}

impl SplineSegment {
    pub fn point(&self, t: f64) -> Vector2<f64> {
        Vector2::new(self.x.value(t), self.y.value(t))
    }

    /// First derivative with respect to `t`.
    pub fn tangent(&self, t: f64) -> Vector2<f64> {
        Vector2::new(self.x.deriv(t), self.y.deriv(t))
    }

    /// Second derivative with respect to `t`.
    pub fn second_deriv(&self, t: f64) -> Vector2<f64> {
        Vector2::new(self.x.deriv2(t), self.y.deriv2(t))
    }

    /// Heading of the tangent, angle to the +x axis in (-pi, pi].
    pub fn heading(&self, t: f64) -> f64 {
        let d = self.tangent(t);
        d.y.atan2(d.x)
    }

    /// Signed curvature in 1/meters, positive for a left turn.
    ///
    /// Returns 0 where the tangent vanishes.
    pub fn curvature(&self, t: f64) -> f64 {
        let d = self.tangent(t);
        let dd = self.second_deriv(t);

        let speed_sq = d.norm_squared();
        if speed_sq <= std::f64::EPSILON {
            return 0.0;
        }

        (d.x * dd.y - d.y * dd.x) / speed_sq.powf(1.5)
    }
}

impl SplineSet {
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Number of waypoints the spline was fitted through.
    pub fn num_waypoints(&self) -> usize {
        match self.boundary {
            Boundary::Closed => self.segments.len(),
            Boundary::Open { .. } => self.segments.len() + 1,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.boundary.is_closed()
    }

    pub fn point(&self, segment: usize, t: f64) -> Vector2<f64> {
        self.segments[segment].point(t)
    }
}

impl Boundary {
    pub fn is_closed(&self) -> bool {
        matches!(self, Boundary::Closed)
    }
}

/// Unit normal to the right of the given direction of travel.
///
/// Returns `None` if the direction has zero length.
pub fn right_normal(direction: &Vector2<f64>) -> Option<Vector2<f64>> {
    Vector2::new(direction.y, -direction.x).try_normalize(std::f64::EPSILON)
}

/// Unit normal to the right of a heading.
pub fn right_normal_from_heading(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(heading_rad.sin(), -heading_rad.cos())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cubic() {
        let c = Cubic::new(1.0, 2.0, 3.0, 4.0);

        assert_eq!(c.value(0.0), 1.0);
        assert_eq!(c.value(1.0), 10.0);
        assert_eq!(c.deriv(0.0), 2.0);
        assert_eq!(c.deriv(1.0), 2.0 + 6.0 + 12.0);
        assert_eq!(c.deriv2(0.0), 6.0);
        assert_eq!(c.deriv2(1.0), 6.0 + 24.0);
    }

    #[test]
    fn test_segment_curvature_sign() {
        // Quarter of a unit circle approximated with a cubic in each axis, counter-clockwise
        let seg = SplineSegment {
            x: Cubic::new(1.0, 0.0, -1.0, 0.0),
            y: Cubic::new(0.0, 1.0, 0.0, 0.0),
        };

        // At t = 0 the path heads in +y and bends towards -x: a left turn
        assert!(seg.curvature(0.0) > 0.0);
        assert!((seg.heading(0.0) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        // Mirror in y to get a right turn
        let mirrored = SplineSegment {
            x: seg.x,
            y: Cubic::new(0.0, -1.0, 0.0, 0.0),
        };
        assert!(mirrored.curvature(0.0) < 0.0);
    }

    #[test]
    fn test_right_normal() {
        let n = right_normal(&Vector2::new(2.0, 0.0)).unwrap();
        assert!((n - Vector2::new(0.0, -1.0)).norm() < 1e-12);

        let n = right_normal_from_heading(std::f64::consts::FRAC_PI_2);
        assert!((n - Vector2::new(1.0, 0.0)).norm() < 1e-12);

        assert!(right_normal(&Vector2::zeros()).is_none());
    }
}
