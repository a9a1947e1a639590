//! # Standard Tracks
//!
//! Generated layouts for the fixed-geometry events. Both layouts are open tracks driven in the +y
//! direction starting from the origin, and can be shrunk with a scale factor in `(0, 1]` for
//! testing in smaller spaces.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::{PI, TAU};

use nalgebra::Vector2;

use crate::{
    primitives::{circle, circular_arc, line, PrimitiveError},
    TrackWidth,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Half width of the standard tracks in meters.
const HALF_WIDTH_M: f64 = 1.5;

/// Length of the acceleration track in meters.
const ACCEL_LENGTH_M: f64 = 150.3;

/// Distance of the skidpad circle centres from the centre line in meters.
const SKIDPAD_CENTRE_OFFSET_M: f64 = 9.125;

/// Position of the skidpad crossing along the track in meters.
const SKIDPAD_CROSSING_M: f64 = 15.0;

/// Inner and outer cone radii of the skidpad circles in meters.
const SKIDPAD_INNER_RADIUS_M: f64 = 7.625;
const SKIDPAD_OUTER_RADIUS_M: f64 = 10.625;

/// Position of the end of the skidpad exit lane in meters.
const SKIDPAD_EXIT_M: f64 = 40.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A complete generated track.
#[derive(Debug, Clone)]
pub struct TrackLayout {
    pub centre_line_m: Vec<Vector2<f64>>,
    pub widths: Vec<TrackWidth>,
    pub right_cones_m: Vec<Vector2<f64>>,
    pub left_cones_m: Vec<Vector2<f64>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Track scale factor must be in (0, 1], found {0}")]
    InvalidScale(f64),

    #[error("Could not generate track geometry: {0}")]
    Primitive(#[from] PrimitiveError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Straight acceleration track.
pub fn acceleration_track(scale: f64) -> Result<TrackLayout, TrackError> {
    check_scale(scale)?;

    let centre_line_m = line(
        Vector2::new(0.0, 0.0),
        Vector2::new(0.0, ACCEL_LENGTH_M),
        30,
        true,
        true,
    )?;
    let left_cones_m = line(
        Vector2::new(-HALF_WIDTH_M, 0.3),
        Vector2::new(-HALF_WIDTH_M, ACCEL_LENGTH_M),
        30,
        true,
        true,
    )?;
    let right_cones_m = line(
        Vector2::new(HALF_WIDTH_M, 0.3),
        Vector2::new(HALF_WIDTH_M, ACCEL_LENGTH_M),
        30,
        true,
        true,
    )?;

    Ok(TrackLayout::scaled(
        centre_line_m,
        right_cones_m,
        left_cones_m,
        scale,
    ))
}

/// Figure-of-eight skidpad track.
///
/// The centre line enters along the y axis, goes round the right circle clockwise, then the left
/// circle counter-clockwise, and leaves along the y axis. If `short` is false each circle is
/// driven twice.
pub fn skidpad(scale: f64, short: bool) -> Result<TrackLayout, TrackError> {
    check_scale(scale)?;

    let right_centre = Vector2::new(SKIDPAD_CENTRE_OFFSET_M, SKIDPAD_CROSSING_M);
    let left_centre = Vector2::new(-SKIDPAD_CENTRE_OFFSET_M, SKIDPAD_CROSSING_M);

    // Half of the gap in the lane cones where the circles meet the lane
    let gap_m = (SKIDPAD_CENTRE_OFFSET_M.powi(2)
        - (SKIDPAD_CENTRE_OFFSET_M - HALF_WIDTH_M).powi(2))
    .sqrt();

    let right_circle = || {
        circle(
            right_centre,
            SKIDPAD_CENTRE_OFFSET_M,
            PI,
            30,
            false,
            false,
        )
    };
    let left_circle = || circle(left_centre, SKIDPAD_CENTRE_OFFSET_M, 0.0, 30, true, false);

    let mut centre_line_m = line(
        Vector2::new(0.0, 0.0),
        Vector2::new(0.0, SKIDPAD_CROSSING_M),
        10,
        true,
        false,
    )?;
    centre_line_m.extend(right_circle()?);
    if !short {
        centre_line_m.extend(right_circle()?);
        centre_line_m.extend(left_circle()?);
    }
    centre_line_m.extend(left_circle()?);
    centre_line_m.extend(line(
        Vector2::new(0.0, SKIDPAD_CROSSING_M),
        Vector2::new(0.0, SKIDPAD_EXIT_M),
        10,
        false,
        true,
    )?);

    let mut left_cones_m = line(
        Vector2::new(-HALF_WIDTH_M, 0.0),
        Vector2::new(-HALF_WIDTH_M, SKIDPAD_CROSSING_M - gap_m),
        2,
        true,
        false,
    )?;
    left_cones_m.extend(circular_arc(
        right_centre,
        SKIDPAD_OUTER_RADIUS_M,
        6.0 / 16.0 * TAU,
        -6.0 / 16.0 * TAU,
        13,
        true,
    )?);
    left_cones_m.extend(circle(
        left_centre,
        SKIDPAD_INNER_RADIUS_M,
        0.0,
        16,
        true,
        false,
    )?);
    left_cones_m.extend(line(
        Vector2::new(-HALF_WIDTH_M, SKIDPAD_CROSSING_M + gap_m),
        Vector2::new(-HALF_WIDTH_M, SKIDPAD_EXIT_M),
        3,
        false,
        true,
    )?);

    let mut right_cones_m = line(
        Vector2::new(HALF_WIDTH_M, 0.0),
        Vector2::new(HALF_WIDTH_M, SKIDPAD_CROSSING_M - gap_m),
        2,
        true,
        false,
    )?;
    right_cones_m.extend(circle(
        right_centre,
        SKIDPAD_INNER_RADIUS_M,
        PI,
        16,
        false,
        false,
    )?);
    right_cones_m.extend(circular_arc(
        left_centre,
        SKIDPAD_OUTER_RADIUS_M,
        2.0 / 16.0 * TAU,
        14.0 / 16.0 * TAU,
        13,
        true,
    )?);
    right_cones_m.extend(line(
        Vector2::new(HALF_WIDTH_M, SKIDPAD_CROSSING_M + gap_m),
        Vector2::new(HALF_WIDTH_M, SKIDPAD_EXIT_M),
        3,
        false,
        true,
    )?);

    Ok(TrackLayout::scaled(
        centre_line_m,
        right_cones_m,
        left_cones_m,
        scale,
    ))
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn check_scale(scale: f64) -> Result<(), TrackError> {
    if scale > 0.0 && scale <= 1.0 {
        Ok(())
    } else {
        Err(TrackError::InvalidScale(scale))
    }
}

impl TrackLayout {
    /// Build a layout with constant width, scaling all geometry by `scale`.
    fn scaled(
        centre_line_m: Vec<Vector2<f64>>,
        right_cones_m: Vec<Vector2<f64>>,
        left_cones_m: Vec<Vector2<f64>>,
        scale: f64,
    ) -> Self {
        let widths = vec![TrackWidth::symmetric(HALF_WIDTH_M * scale); centre_line_m.len()];

        Self {
            centre_line_m: centre_line_m.into_iter().map(|p| p * scale).collect(),
            widths,
            right_cones_m: right_cones_m.into_iter().map(|p| p * scale).collect(),
            left_cones_m: left_cones_m.into_iter().map(|p| p * scale).collect(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_acceleration_track() -> Result<(), TrackError> {
        let track = acceleration_track(0.5)?;

        assert_eq!(track.centre_line_m.len(), 30);
        assert_eq!(track.widths.len(), 30);
        assert!((track.widths[0].right_m - 0.75).abs() < 1e-12);
        assert!((track.centre_line_m[29].y - 0.5 * ACCEL_LENGTH_M).abs() < 1e-9);
        assert!(track.right_cones_m.iter().all(|c| c.x > 0.0));
        assert!(track.left_cones_m.iter().all(|c| c.x < 0.0));

        assert!(matches!(
            acceleration_track(1.5),
            Err(TrackError::InvalidScale(_))
        ));

        Ok(())
    }

    #[test]
    fn test_skidpad() -> Result<(), TrackError> {
        let short = skidpad(1.0, true)?;
        let long = skidpad(1.0, false)?;

        // Entry and exit lanes plus one or two laps of each circle
        assert_eq!(short.centre_line_m.len(), 10 + 2 * 30 + 10);
        assert_eq!(long.centre_line_m.len(), 10 + 4 * 30 + 10);
        assert_eq!(short.widths.len(), short.centre_line_m.len());

        // Consecutive centre line points never coincide, the circles join the lanes without
        // repeating the crossing point
        for pair in long.centre_line_m.windows(2) {
            assert!((pair[1] - pair[0]).norm() > 0.1);
        }

        // The first circle is the right one, driven clockwise
        assert!(short.centre_line_m[15].x > 0.0);
        assert!(short.centre_line_m[45].x < 0.0);

        assert_eq!(short.left_cones_m.len(), 2 + 13 + 16 + 3);
        assert_eq!(short.right_cones_m.len(), 2 + 16 + 13 + 3);

        Ok(())
    }
}
