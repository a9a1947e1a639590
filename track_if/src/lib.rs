//! # Track Interface
//!
//! Shared definitions of the track data exchanged between the reference path planner and the
//! tooling around it: track geometry primitives, the on-disk track formats and the standard event
//! layouts.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Point sequence generators (lines, circles, arcs)
pub mod primitives;

/// Loading and saving of centre lines and cones
pub mod io;

/// Standard event tracks (acceleration, skidpad)
pub mod tracks;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Width of the track either side of a centre line point.
///
/// Right and left are taken relative to the direction of travel.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackWidth {
    /// Distance from the centre line to the right boundary in meters.
    pub right_m: f64,

    /// Distance from the centre line to the left boundary in meters.
    pub left_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TrackWidth {
    pub fn new(right_m: f64, left_m: f64) -> Self {
        Self { right_m, left_m }
    }

    /// Same width on both sides of the centre line.
    pub fn symmetric(half_width_m: f64) -> Self {
        Self::new(half_width_m, half_width_m)
    }

    /// Linear interpolation between two widths, `t = 0` giving `self`.
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self {
            right_m: self.right_m + t * (other.right_m - self.right_m),
            left_m: self.left_m + t * (other.left_m - self.left_m),
        }
    }
}
