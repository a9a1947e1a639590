//! Reference path parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use crate::min_curv;
use crate::spline::{Boundary, DEFAULT_NUM_SUBSAMPLES};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the reference path pipeline.
///
/// Every field has a default, so a parameter file only needs to list the
/// values it changes.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RefPathParams {
    /// Top speed of the vehicle
    pub v_x_max_ms: f64,

    /// Maximum lateral acceleration of the vehicle
    pub a_y_max_mss: f64,

    /// Whether the centre line is replaced by a minimum curvature line
    pub min_curv: bool,

    /// Width of the vehicle, required when `min_curv` is set
    pub vehicle_width_m: Option<f64>,

    /// Point spacing the centre line is resampled to before optimisation
    pub resample_step_m: f64,

    /// Point spacing of the final path
    pub interp_step_m: f64,

    /// Maximum absolute curvature allowed by the optimiser
    pub kappa_bound_m: f64,

    /// Number of subsamples per spline segment used to estimate lengths
    pub num_subsamples: usize,

    /// Whether to keep the resampled centre line and track edges
    pub compute_intermediates: bool,

    /// QP solver parameters
    pub min_curv_solver: min_curv::Params,
}

/// Parameters of the reference path executable.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExecParams {
    /// Boundary condition of the loaded centre line
    pub boundary: Boundary,

    /// Pipeline parameters
    #[serde(default)]
    pub ref_path: RefPathParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for RefPathParams {
    fn default() -> Self {
        Self {
            v_x_max_ms: 10.0,
            a_y_max_mss: 8.0,
            min_curv: false,
            vehicle_width_m: None,
            resample_step_m: 1.0,
            interp_step_m: 0.1,
            kappa_bound_m: 0.4,
            num_subsamples: DEFAULT_NUM_SUBSAMPLES,
            compute_intermediates: false,
            min_curv_solver: min_curv::Params::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_partial_params() {
        let params: RefPathParams = util::params::from_str(
            "v_x_max_ms = 25.0\n\
             min_curv = true\n\
             vehicle_width_m = 1.5\n\
             [min_curv_solver]\n\
             max_iter = 50\n",
        )
        .unwrap();

        assert_eq!(params.v_x_max_ms, 25.0);
        assert!(params.min_curv);
        assert_eq!(params.vehicle_width_m, Some(1.5));
        assert_eq!(params.min_curv_solver.max_iter, 50);

        // Unlisted values keep their defaults
        assert_eq!(params.interp_step_m, 0.1);
        assert_eq!(
            params.min_curv_solver.tol_feas,
            min_curv::Params::default().tol_feas
        );
    }

    #[test]
    fn test_exec_params() {
        let params: ExecParams = util::params::from_str(
            "[boundary]\n\
             kind = \"open\"\n\
             psi_s_rad = 1.5707963267948966\n\
             psi_e_rad = 0.0\n\
             [ref_path]\n\
             a_y_max_mss = 5.0\n",
        )
        .unwrap();

        assert_eq!(
            params.boundary,
            Boundary::Open {
                psi_s_rad: std::f64::consts::FRAC_PI_2,
                psi_e_rad: 0.0
            }
        );
        assert_eq!(params.ref_path.a_y_max_mss, 5.0);

        let closed: ExecParams =
            util::params::from_str("[boundary]\nkind = \"closed\"\n").unwrap();
        assert_eq!(closed.boundary, Boundary::Closed);
        assert_eq!(closed.ref_path, RefPathParams::default());
    }

    #[test]
    fn test_shipped_params() {
        let params: ExecParams = util::params::load_from_path(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../params/refpath_exec.toml"
        ))
        .unwrap();

        assert_eq!(params.boundary, Boundary::Closed);
        assert!(params.ref_path.min_curv);
        assert!(params.ref_path.vehicle_width_m.is_some());
    }
}
