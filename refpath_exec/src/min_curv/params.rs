//! Minimum curvature optimiser parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the QP solver behind the minimum curvature optimiser
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Maximum number of interior point iterations
    pub max_iter: u32,

    /// Feasibility tolerance of the solver
    pub tol_feas: f64,

    /// Absolute duality gap tolerance of the solver
    pub tol_gap_abs: f64,

    /// Relative duality gap tolerance of the solver
    pub tol_gap_rel: f64,

    /// How far a solution may sit outside the lateral bounds before it is
    /// rejected. Solutions within this distance are clamped onto the bounds.
    pub bound_tolerance_m: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tol_feas: 1e-8,
            tol_gap_abs: 1e-8,
            tol_gap_rel: 1e-8,
            bound_tolerance_m: 1e-3,
        }
    }
}
