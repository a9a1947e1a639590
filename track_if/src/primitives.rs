//! # Track Primitives
//!
//! Generators for the simple point sequences tracks are assembled from. All generators sample
//! their parameter linearly, in the same way as a `linspace`, with control over whether the end
//! (and for lines, the start) of the interval is included.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector2;
use std::f64::consts::TAU;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PrimitiveError {
    #[error("At least one point must be generated")]
    NoPoints,

    #[error("A line must include at least one of its start and end points")]
    NoLineEnds,

    #[error("Expected a strictly positive radius, found {0} m")]
    InvalidRadius(f64),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Generate `num_points` points on the line between `start` and `end`.
///
/// If `include_start` is false the points are spaced so that the start is left out but the end is
/// reached, if `include_end` is false the end is left out instead. At least one of them must be
/// included.
pub fn line(
    start: Vector2<f64>,
    end: Vector2<f64>,
    num_points: usize,
    include_start: bool,
    include_end: bool,
) -> Result<Vec<Vector2<f64>>, PrimitiveError> {
    if num_points == 0 {
        return Err(PrimitiveError::NoPoints);
    }
    if !include_start && !include_end {
        return Err(PrimitiveError::NoLineEnds);
    }

    // Without the start the sequence is generated backwards from the end and reversed, so that
    // the spacing is the same as the forward case.
    if !include_start {
        let mut points: Vec<Vector2<f64>> = linspace(0.0, 1.0, num_points, false)
            .into_iter()
            .map(|f| end + f * (start - end))
            .collect();
        points.reverse();
        return Ok(points);
    }

    Ok(linspace(0.0, 1.0, num_points, include_end)
        .into_iter()
        .map(|f| start + f * (end - start))
        .collect())
}

/// Generate a full circle of `num_points` starting from `start_angle_rad`.
///
/// When `counter_clockwise` is true the circle is traversed in the trigonometric sense.
pub fn circle(
    centre: Vector2<f64>,
    radius_m: f64,
    start_angle_rad: f64,
    num_points: usize,
    counter_clockwise: bool,
    include_end: bool,
) -> Result<Vec<Vector2<f64>>, PrimitiveError> {
    let end_angle_rad = match counter_clockwise {
        true => start_angle_rad + TAU,
        false => start_angle_rad - TAU,
    };

    circular_arc(
        centre,
        radius_m,
        start_angle_rad,
        end_angle_rad,
        num_points,
        include_end,
    )
}

/// Generate an arc of `num_points` between two angles.
///
/// The arc is counter-clockwise if `end_angle_rad > start_angle_rad` and clockwise otherwise.
pub fn circular_arc(
    centre: Vector2<f64>,
    radius_m: f64,
    start_angle_rad: f64,
    end_angle_rad: f64,
    num_points: usize,
    include_end: bool,
) -> Result<Vec<Vector2<f64>>, PrimitiveError> {
    if num_points == 0 {
        return Err(PrimitiveError::NoPoints);
    }
    if !(radius_m > 0.0) {
        return Err(PrimitiveError::InvalidRadius(radius_m));
    }

    Ok(
        linspace(start_angle_rad, end_angle_rad, num_points, include_end)
            .into_iter()
            .map(|theta| centre + radius_m * Vector2::new(theta.cos(), theta.sin()))
            .collect(),
    )
}

/// Evenly spaced values over `[start, stop]`, or `[start, stop)` if `include_end` is false.
pub fn linspace(start: f64, stop: f64, num: usize, include_end: bool) -> Vec<f64> {
    if num == 0 {
        return Vec::new();
    }
    if num == 1 {
        return vec![start];
    }

    let divisor = match include_end {
        true => (num - 1) as f64,
        false => num as f64,
    };
    let step = (stop - start) / divisor;

    (0..num)
        .map(|i| {
            // Pin the last value so rounding can't leave it short of the end
            if include_end && i == num - 1 {
                stop
            } else {
                start + i as f64 * step
            }
        })
        .collect()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
