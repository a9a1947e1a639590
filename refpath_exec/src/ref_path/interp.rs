//! Piecewise linear lookup tables

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use util::maths::lin_map;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A piecewise linear function sampled at strictly increasing knots.
///
/// Queries outside the knots return the value at the nearest end.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTable {
    knots: Vec<f64>,
    values: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("A table needs at least 2 knots, got {0}")]
    TooFewKnots(usize),

    #[error("Got {knots} knots but {values} values")]
    LengthMismatch { knots: usize, values: usize },

    #[error("Knot {0} does not increase on the previous knot")]
    NotIncreasing(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LinearTable {
    pub fn new(knots: Vec<f64>, values: Vec<f64>) -> Result<Self, TableError> {
        if knots.len() != values.len() {
            return Err(TableError::LengthMismatch {
                knots: knots.len(),
                values: values.len(),
            });
        }
        if knots.len() < 2 {
            return Err(TableError::TooFewKnots(knots.len()));
        }
        if let Some(i) = knots.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(TableError::NotIncreasing(i + 1));
        }

        Ok(Self { knots, values })
    }

    /// Evaluate the table at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let last = self.knots.len() - 1;

        if x.is_nan() {
            return std::f64::NAN;
        }
        if x <= self.knots[0] {
            return self.values[0];
        }
        if x >= self.knots[last] {
            return self.values[last];
        }

        let hi = self.knots.partition_point(|&k| k <= x);
        let lo = hi - 1;

        lin_map(
            (self.knots[lo], self.knots[hi]),
            (self.values[lo], self.values[hi]),
            x,
        )
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
