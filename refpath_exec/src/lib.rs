//! # Reference path library.
//!
//! Turns a track centre line into a time-parametrised reference path for a racing vehicle. The
//! pipeline fits splines through the centre line, optionally shifts it to a minimum curvature line
//! inside the track, resamples the result finely and assigns a speed and passage time to every
//! point. The finished [`ReferencePath`] answers position, heading, speed and time lookups and
//! localises positions on the path.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Minimum curvature optimiser - lateral offsets of a line which minimise its curvature
pub mod min_curv;

/// Parameters of the pipeline and of the executable
pub mod params;

/// Raceline - the finely sampled path built from a line and its offsets
pub mod raceline;

/// Reference path - the builder running the pipeline and the queryable result
pub mod ref_path;

/// Splines - fitting, length estimation and resampling
pub mod spline;

/// Velocity profile - speeds and passage times from curvature
pub mod vel_profile;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use ref_path::{RefPathError, ReferencePath, ReferencePathBuilder};
pub use spline::Boundary;
