//! # Velocity Profile
//!
//! Assigns a speed to every point of a path from its curvature, and integrates the speeds along
//! the path into passage times.
//!
//! The speed at each point is the lower of the top speed and the speed at which the lateral
//! acceleration reaches its limit, `sqrt(a_y_max / |kappa|)`. Longitudinal acceleration limits
//! are not modelled.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::debug;
use serde::Serialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Curvatures with a smaller magnitude than this are treated as straight.
pub const CURVATURE_EPSILON_M: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Speed and passage time along a path.
#[derive(Debug, Clone, Serialize)]
pub struct VelocityProfile {
    /// Speed at each point.
    pub velocity_ms: Vec<f64>,

    /// Time at which each point is reached, starting at 0. Closed paths have one extra entry,
    /// the time at which the start is reached again.
    pub passage_time_s: Vec<f64>,

    /// Time to drive the whole path.
    pub total_time_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VelProfileError {
    #[error("The maximum speed must be positive and finite, got {0}")]
    InvalidMaxSpeed(f64),

    #[error("The maximum lateral acceleration must be positive and finite, got {0}")]
    InvalidMaxLatAccel(f64),

    #[error("Curvature at point {0} is not finite")]
    NonFiniteCurvature(usize),

    #[error("Expected {expected} element lengths, got {found}")]
    ElementCountMismatch { expected: usize, found: usize },

    #[error("Element {index} has a non-positive length ({length_m})")]
    InvalidElement { index: usize, length_m: f64 },

    #[error("Speed at point {0} is not positive")]
    InvalidSpeed(usize),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Compute the speed and passage time profile of a path.
///
/// `el_lengths_m` must hold one element per point for a closed path (the last element closing
/// the loop) and one fewer for an open path.
pub fn calc_velocity_profile(
    curvature_m: &[f64],
    el_lengths_m: &[f64],
    closed: bool,
    v_x_max_ms: f64,
    a_y_max_mss: f64,
) -> Result<VelocityProfile, VelProfileError> {
    let velocity_ms = velocity_bound(curvature_m, v_x_max_ms, a_y_max_mss)?;
    let passage_time_s = passage_time(el_lengths_m, &velocity_ms, closed)?;
    let total_time_s = passage_time_s.last().copied().unwrap_or(0.0);

    debug!(
        "Velocity profile: {} points, speeds {:.3}..{:.3} m/s, total time {:.3} s",
        velocity_ms.len(),
        velocity_ms.iter().cloned().fold(std::f64::INFINITY, f64::min),
        velocity_ms.iter().cloned().fold(0.0, f64::max),
        total_time_s
    );

    Ok(VelocityProfile {
        velocity_ms,
        passage_time_s,
        total_time_s,
    })
}

/// Speed limit at each point from the top speed and the lateral acceleration limit.
pub fn velocity_bound(
    curvature_m: &[f64],
    v_x_max_ms: f64,
    a_y_max_mss: f64,
) -> Result<Vec<f64>, VelProfileError> {
    if !(v_x_max_ms.is_finite() && v_x_max_ms > 0.0) {
        return Err(VelProfileError::InvalidMaxSpeed(v_x_max_ms));
    }
    if !(a_y_max_mss.is_finite() && a_y_max_mss > 0.0) {
        return Err(VelProfileError::InvalidMaxLatAccel(a_y_max_mss));
    }

    curvature_m
        .iter()
        .enumerate()
        .map(|(i, &k)| {
            if !k.is_finite() {
                return Err(VelProfileError::NonFiniteCurvature(i));
            }

            if k.abs() < CURVATURE_EPSILON_M {
                Ok(v_x_max_ms)
            } else {
                Ok(v_x_max_ms.min((a_y_max_mss / k.abs()).sqrt()))
            }
        })
        .collect()
}

/// Time at which each point is reached, integrating each element at the mean speed of its ends.
///
/// For a closed path the returned vector has one more entry than there are points, the last
/// being the lap time.
pub fn passage_time(
    el_lengths_m: &[f64],
    velocity_ms: &[f64],
    closed: bool,
) -> Result<Vec<f64>, VelProfileError> {
    let num_points = velocity_ms.len();
    let expected = match closed {
        true => num_points,
        false => num_points.saturating_sub(1),
    };

    if el_lengths_m.len() != expected {
        return Err(VelProfileError::ElementCountMismatch {
            expected,
            found: el_lengths_m.len(),
        });
    }

    if let Some(i) = velocity_ms.iter().position(|v| !(v.is_finite() && *v > 0.0)) {
        return Err(VelProfileError::InvalidSpeed(i));
    }

    let mut times = Vec::with_capacity(expected + 1);
    let mut t = 0.0;
    times.push(t);

    for (index, &length_m) in el_lengths_m.iter().enumerate() {
        if !(length_m.is_finite() && length_m > 0.0) {
            return Err(VelProfileError::InvalidElement { index, length_m });
        }

        let v_start = velocity_ms[index];
        let v_end = velocity_ms[(index + 1) % num_points];
        t += 2.0 * length_m / (v_start + v_end);
        times.push(t);
    }

    Ok(times)
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
