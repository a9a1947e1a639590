//! # Tridiagonal Solver
//!
//! Linear solve of tridiagonal systems, optionally with the two corner entries of a cyclic
//! system. A factorisation is computed once and then applied to any number of right hand sides in
//! linear time.
//!
//! Cyclic systems are reduced to a plain tridiagonal one with a rank one correction
//! (Sherman-Morrison), so both cases share the same forward and backward sweep.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A square tridiagonal matrix.
///
/// Row `i` reads `lower[i] x[i - 1] + diag[i] x[i] + upper[i] x[i + 1]`. For a cyclic matrix the
/// indices wrap, so `lower[0]` multiplies `x[n - 1]` and `upper[n - 1]` multiplies `x[0]`.
/// Otherwise those two entries are ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    pub lower: Vec<f64>,
    pub diag: Vec<f64>,
    pub upper: Vec<f64>,
    pub cyclic: bool,
}

/// Factorised form of a [`Tridiagonal`] matrix.
#[derive(Debug, Clone)]
pub struct TridiagonalLu {
    lower: Vec<f64>,
    upper_mod: Vec<f64>,
    pivots: Vec<f64>,
    correction: Option<CyclicCorrection>,
}

/// Rank one correction turning the plain sweep into a cyclic solve.
#[derive(Debug, Clone)]
struct CyclicCorrection {
    /// Solution of the plain system for the correction vector
    z: Vec<f64>,

    /// `top_right / gamma`
    ratio: f64,

    /// `1 + z[0] + ratio z[n - 1]`
    denom: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TridiagError {
    #[error("Band lengths disagree: {lower} lower, {diag} diagonal and {upper} upper entries")]
    BandMismatch {
        lower: usize,
        diag: usize,
        upper: usize,
    },

    #[error("A cyclic system needs at least 3 rows, got {0}")]
    TooSmallForCyclic(usize),

    #[error("Zero pivot in row {0}")]
    ZeroPivot(usize),

    #[error("Expected a right hand side of length {expected}, got {found}")]
    RhsMismatch { expected: usize, found: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tridiagonal {
    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// Factorise the matrix for repeated solves.
    pub fn factorise(&self) -> Result<TridiagonalLu, TridiagError> {
        let n = self.diag.len();
        if self.lower.len() != n || self.upper.len() != n {
            return Err(TridiagError::BandMismatch {
                lower: self.lower.len(),
                diag: n,
                upper: self.upper.len(),
            });
        }

        if !self.cyclic {
            return sweep_factorise(&self.lower, &self.diag, &self.upper);
        }

        if n < 3 {
            return Err(TridiagError::TooSmallForCyclic(n));
        }

        let top_right = self.lower[0];
        let bottom_left = self.upper[n - 1];

        let gamma = -self.diag[0];
        if gamma == 0.0 {
            return Err(TridiagError::ZeroPivot(0));
        }

        let mut diag = self.diag.clone();
        diag[0] -= gamma;
        diag[n - 1] -= bottom_left * top_right / gamma;

        let mut lu = sweep_factorise(&self.lower, &diag, &self.upper)?;

        let mut u = vec![0.0; n];
        u[0] = gamma;
        u[n - 1] = bottom_left;
        let z = lu.sweep(&u);

        let ratio = top_right / gamma;
        let denom = 1.0 + z[0] + ratio * z[n - 1];
        if !denom.is_finite() || denom.abs() <= std::f64::EPSILON {
            return Err(TridiagError::ZeroPivot(n - 1));
        }

        lu.correction = Some(CyclicCorrection { z, ratio, denom });

        Ok(lu)
    }
}

impl TridiagonalLu {
    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    /// Solve the factorised system for one right hand side.
    pub fn solve(&self, rhs: &[f64]) -> Result<Vec<f64>, TridiagError> {
        if rhs.len() != self.len() {
            return Err(TridiagError::RhsMismatch {
                expected: self.len(),
                found: rhs.len(),
            });
        }

        let mut x = self.sweep(rhs);

        if let Some(corr) = &self.correction {
            let n = x.len();
            let factor = (x[0] + corr.ratio * x[n - 1]) / corr.denom;
            for (xi, zi) in x.iter_mut().zip(corr.z.iter()) {
                *xi -= factor * zi;
            }
        }

        Ok(x)
    }

    /// Forward and backward sweep of the plain tridiagonal part.
    fn sweep(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.pivots.len();
        let mut x = vec![0.0; n];

        if n == 0 {
            return x;
        }

        x[0] = rhs[0] / self.pivots[0];
        for i in 1..n {
            x[i] = (rhs[i] - self.lower[i] * x[i - 1]) / self.pivots[i];
        }

        for i in (0..n - 1).rev() {
            x[i] -= self.upper_mod[i] * x[i + 1];
        }

        x
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Gaussian elimination without pivoting on the three bands.
fn sweep_factorise(
    lower: &[f64],
    diag: &[f64],
    upper: &[f64],
) -> Result<TridiagonalLu, TridiagError> {
    let n = diag.len();
    let mut pivots = Vec::with_capacity(n);
    let mut upper_mod = Vec::with_capacity(n);

    for i in 0..n {
        let pivot = match i {
            0 => diag[0],
            _ => diag[i] - lower[i] * upper_mod[i - 1],
        };

        if !pivot.is_finite() || pivot.abs() <= std::f64::EPSILON * diag[i].abs().max(1.0) {
            return Err(TridiagError::ZeroPivot(i));
        }

        pivots.push(pivot);
        upper_mod.push(match i + 1 < n {
            true => upper[i] / pivot,
            false => 0.0,
        });
    }

    Ok(TridiagonalLu {
        lower: lower.to_vec(),
        upper_mod,
        pivots,
        correction: None,
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
