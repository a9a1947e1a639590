//! # Spline Resampling
//!
//! Arc length estimation over a fitted spline and resampling at an approximately uniform spacing.
//!
//! Segment lengths are estimated by summing the chords between a fixed number of subsamples along
//! each segment. The same subsample tables are used to invert arc length back into a local `t`.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector2;
use serde::Serialize;
use thiserror::Error;

use track_if::TrackWidth;

use super::SplineSet;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default number of subsamples per segment used for length estimation.
pub const DEFAULT_NUM_SUBSAMPLES: usize = 100;

/// Largest number of points a single resampling may produce.
pub const MAX_RESAMPLED_POINTS: usize = 10_000_000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Estimated arc lengths of each segment of a spline.
#[derive(Debug, Clone)]
pub struct SegmentLengths {
    /// Length of each segment.
    pub lengths_m: Vec<f64>,

    /// Cumulative length at each subsample of each segment, starting at 0 and ending at the
    /// segment's length.
    tables: Vec<Vec<f64>>,
}

/// A point produced by resampling a spline.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ResampledPoint {
    pub position_m: Vector2<f64>,

    /// Arc length along the spline.
    pub s_m: f64,

    /// Index of the segment holding the point.
    pub segment: usize,

    /// Local parameter of the point within its segment.
    pub t: f64,
}

/// The output of resampling a spline.
#[derive(Debug, Clone)]
pub struct Resampled {
    pub points: Vec<ResampledPoint>,

    /// Total length of the resampled spline.
    pub total_length_m: f64,

    /// Spacing between consecutive points.
    pub spacing_m: f64,

    pub closed: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResampleError {
    #[error("The resampling step must be positive and finite, got {0}")]
    InvalidStep(f64),

    #[error("At least 2 subsamples per segment are required, got {0}")]
    TooFewSubsamples(usize),

    #[error("The spline has zero length")]
    ZeroLength,

    #[error(
        "A step of {step_m} m over {length_m:.3} m needs more than {} points",
        MAX_RESAMPLED_POINTS
    )]
    TooManyPoints { step_m: f64, length_m: f64 },

    #[error("Expected {expected} track widths (one per waypoint), got {found}")]
    WidthCountMismatch { expected: usize, found: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SegmentLengths {
    pub fn total_m(&self) -> f64 {
        self.lengths_m.iter().sum()
    }

    /// Invert a length along a segment into the segment's local parameter.
    ///
    /// Lengths outside `[0, L]` are clamped onto the segment.
    pub fn t_at_length(&self, segment: usize, length_m: f64) -> f64 {
        let table = &self.tables[segment];
        let last = table.len() - 1;

        if length_m <= 0.0 {
            return 0.0;
        }
        if length_m >= table[last] {
            return 1.0;
        }

        // First subsample strictly beyond the target, which is never the first entry
        let hi = table.partition_point(|&l| l <= length_m).min(last).max(1);
        let lo = hi - 1;

        let span = table[hi] - table[lo];
        let frac = if span > 0.0 {
            (length_m - table[lo]) / span
        } else {
            0.0
        };

        (lo as f64 + frac) / last as f64
    }
}

impl Resampled {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> Vec<Vector2<f64>> {
        self.points.iter().map(|p| p.position_m).collect()
    }

    pub fn arc_lengths(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.s_m).collect()
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Estimate the length of each segment by summing the chords between `num_subsamples` points
/// evenly spaced in `t`.
pub fn segment_lengths(
    splines: &SplineSet,
    num_subsamples: usize,
) -> Result<SegmentLengths, ResampleError> {
    if num_subsamples < 2 {
        return Err(ResampleError::TooFewSubsamples(num_subsamples));
    }

    let step = 1.0 / (num_subsamples - 1) as f64;

    let tables: Vec<Vec<f64>> = splines
        .segments
        .iter()
        .map(|seg| {
            let mut table = Vec::with_capacity(num_subsamples);
            let mut length = 0.0;
            let mut prev = seg.point(0.0);
            table.push(0.0);

            for k in 1..num_subsamples {
                let point = seg.point(k as f64 * step);
                length += (point - prev).norm();
                table.push(length);
                prev = point;
            }

            table
        })
        .collect();

    let lengths_m = tables
        .iter()
        .map(|t| t.last().copied().unwrap_or(0.0))
        .collect();

    Ok(SegmentLengths { lengths_m, tables })
}

/// Resample the spline at an approximately uniform spacing close to `step_m`.
///
/// The number of intervals is `ceil(L / step_m)` and the actual spacing is `L` divided by that
/// number. Closed splines do not repeat the starting point at the end, open splines include both
/// ends.
pub fn resample(
    splines: &SplineSet,
    lengths: &SegmentLengths,
    step_m: f64,
) -> Result<Resampled, ResampleError> {
    if !(step_m.is_finite() && step_m > 0.0) {
        return Err(ResampleError::InvalidStep(step_m));
    }

    let total_length_m = lengths.total_m();
    if total_length_m <= 0.0 {
        return Err(ResampleError::ZeroLength);
    }

    let num_intervals = (total_length_m / step_m).ceil();
    if !(num_intervals < MAX_RESAMPLED_POINTS as f64) {
        return Err(ResampleError::TooManyPoints {
            step_m,
            length_m: total_length_m,
        });
    }
    let num_intervals = (num_intervals as usize).max(1);
    let spacing_m = total_length_m / num_intervals as f64;
    let closed = splines.is_closed();

    let num_points = match closed {
        true => num_intervals,
        false => num_intervals + 1,
    };

    // Arc length at the end of each segment
    let mut seg_ends = Vec::with_capacity(lengths.lengths_m.len());
    let mut acc = 0.0;
    for l in lengths.lengths_m.iter() {
        acc += l;
        seg_ends.push(acc);
    }
    let last_seg = seg_ends.len() - 1;

    let mut points = Vec::with_capacity(num_points);

    for k in 0..num_points {
        let s_m = match k == num_intervals {
            true => total_length_m,
            false => k as f64 * spacing_m,
        };

        let segment = seg_ends.partition_point(|&e| e <= s_m).min(last_seg);
        let seg_start = seg_ends[segment] - lengths.lengths_m[segment];
        let t = lengths.t_at_length(segment, s_m - seg_start);

        points.push(ResampledPoint {
            position_m: splines.point(segment, t),
            s_m,
            segment,
            t,
        });
    }

    debug!(
        "Resampled {} segments into {} points (length {:.3} m, spacing {:.4} m)",
        splines.num_segments(),
        points.len(),
        total_length_m,
        spacing_m
    );

    Ok(Resampled {
        points,
        total_length_m,
        spacing_m,
        closed,
    })
}

/// Linearly interpolate the waypoint track widths onto resampled points.
///
/// `widths` holds one entry per waypoint the spline was fitted through. Each point takes the
/// widths of its segment's two waypoints blended by its local parameter.
pub fn interp_widths(
    widths: &[TrackWidth],
    splines: &SplineSet,
    resampled: &Resampled,
) -> Result<Vec<TrackWidth>, ResampleError> {
    let expected = splines.num_waypoints();
    if widths.len() != expected {
        return Err(ResampleError::WidthCountMismatch {
            expected,
            found: widths.len(),
        });
    }

    Ok(resampled
        .points
        .iter()
        .map(|p| {
            let next = (p.segment + 1) % widths.len();
            widths[p.segment].lerp(&widths[next], p.t)
        })
        .collect())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::spline::{fit_splines, Boundary};
    use std::f64::consts::PI;
    use track_if::primitives;

    fn circle_splines(radius_m: f64) -> SplineSet {
        let points =
            primitives::circle(Vector2::zeros(), radius_m, 0.0, 40, true, false).unwrap();
        fit_splines(&points, Boundary::Closed).unwrap()
    }

    fn straight_splines() -> SplineSet {
        let points: Vec<_> = primitives::linspace(0.0, 20.0, 5, true)
            .into_iter()
            .map(|x| Vector2::new(x, 0.0))
            .collect();

        fit_splines(
            &points,
            Boundary::Open {
                psi_s_rad: 0.0,
                psi_e_rad: 0.0,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_segment_lengths() {
        let splines = circle_splines(10.0);
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();

        assert_eq!(lengths.lengths_m.len(), 40);
        assert!((lengths.total_m() - 2.0 * PI * 10.0).abs() < 1e-2);

        let straight = segment_lengths(&straight_splines(), 10).unwrap();
        for l in straight.lengths_m.iter() {
            assert!((l - 5.0).abs() < 1e-9);
        }

        assert_eq!(
            segment_lengths(&splines, 1).unwrap_err(),
            ResampleError::TooFewSubsamples(1)
        );
    }

    #[test]
    fn test_resample_closed() {
        let splines = circle_splines(10.0);
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();
        let resampled = resample(&splines, &lengths, 1.0).unwrap();

        let expected = (lengths.total_m() / 1.0).ceil() as usize;
        assert_eq!(resampled.len(), expected);
        assert!(resampled.spacing_m <= 1.0);
        assert!(resampled.closed);

        // The starting point is not repeated at the end
        let first = resampled.points[0].position_m;
        let last = resampled.points[resampled.len() - 1].position_m;
        assert!((first - last).norm() > 0.5);

        // Consecutive points are close to the requested spacing
        for pair in resampled.points.windows(2) {
            let d = (pair[1].position_m - pair[0].position_m).norm();
            assert!((d - resampled.spacing_m).abs() < 1e-2);
            assert!(pair[1].s_m > pair[0].s_m);
        }
    }

    #[test]
    fn test_resample_open_includes_ends() {
        let splines = straight_splines();
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();
        let resampled = resample(&splines, &lengths, 3.0).unwrap();

        // 20 m at 3 m gives 7 intervals of 20/7 m
        assert_eq!(resampled.len(), 8);
        assert!((resampled.spacing_m - 20.0 / 7.0).abs() < 1e-12);
        assert!(resampled.points[0].position_m.norm() < 1e-9);
        assert!((resampled.points[7].position_m - Vector2::new(20.0, 0.0)).norm() < 1e-9);

        for (k, p) in resampled.points.iter().enumerate() {
            assert!((p.position_m.x - k as f64 * 20.0 / 7.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_resample_deterministic() {
        let splines = circle_splines(7.5);
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();

        let a = resample(&splines, &lengths, 0.7).unwrap();
        let b = resample(&splines, &lengths, 0.7).unwrap();

        assert_eq!(a.points, b.points);
    }

    #[test]
    fn test_resample_invalid_step() {
        let splines = straight_splines();
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();

        assert_eq!(
            resample(&splines, &lengths, 0.0).unwrap_err(),
            ResampleError::InvalidStep(0.0)
        );
        assert!(matches!(
            resample(&splines, &lengths, std::f64::NAN),
            Err(ResampleError::InvalidStep(_))
        ));

        // Positive but far too fine for the length
        assert!(matches!(
            resample(&splines, &lengths, 1e-300),
            Err(ResampleError::TooManyPoints { .. })
        ));
        assert!(matches!(
            resample(&splines, &lengths, std::f64::MIN_POSITIVE),
            Err(ResampleError::TooManyPoints { .. })
        ));
    }

    #[test]
    fn test_interp_widths() {
        let points = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(10.0, 0.0),
            Vector2::new(20.0, 0.0),
        ];
        let splines = fit_splines(
            &points,
            Boundary::Open {
                psi_s_rad: 0.0,
                psi_e_rad: 0.0,
            },
        )
        .unwrap();
        let lengths = segment_lengths(&splines, DEFAULT_NUM_SUBSAMPLES).unwrap();
        let resampled = resample(&splines, &lengths, 5.0).unwrap();

        let widths = vec![
            TrackWidth::new(1.0, 1.0),
            TrackWidth::new(3.0, 2.0),
            TrackWidth::new(1.0, 1.0),
        ];
        let interp = interp_widths(&widths, &splines, &resampled).unwrap();

        assert_eq!(interp.len(), 5);
        assert!((interp[1].right_m - 2.0).abs() < 1e-6);
        assert!((interp[1].left_m - 1.5).abs() < 1e-6);
        assert!((interp[2].right_m - 3.0).abs() < 1e-6);
        assert!((interp[4].right_m - 1.0).abs() < 1e-6);

        assert_eq!(
            interp_widths(&widths[..2], &splines, &resampled).unwrap_err(),
            ResampleError::WidthCountMismatch {
                expected: 3,
                found: 2
            }
        );
    }
}
