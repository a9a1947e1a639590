//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Map a value from one range into another.
///
/// Values outside the source range are extrapolated linearly.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    value.max(min).min(max)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap a value into the half-open period `[0, period)`.
///
/// Unlike `rem_euclid` the result is guaranteed to be strictly less than the
/// period.
pub fn wrap_to_period<T>(value: T, period: T) -> T
where
    T: Float
{
    let r = rem_euclid(value, period);
    if r >= period.abs() { T::zero() } else { r }
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_to_pi<T>(angle_rad: T) -> T
where
    T: Float + FloatConst
{
    let pi_t = T::PI();
    let tau_t = pi_t + pi_t;

    let wrapped = rem_euclid(angle_rad + pi_t, tau_t) - pi_t;
    if wrapped <= -pi_t { wrapped + tau_t } else { wrapped }
}

/// Remove the 2pi jumps from a sequence of angles so that consecutive angles
/// never differ by more than pi.
///
/// The first angle is left unchanged.
pub fn unwrap_angles<T>(angles_rad: &[T]) -> Vec<T>
where
    T: Float + FloatConst
{
    let mut unwrapped = Vec::with_capacity(angles_rad.len());

    let mut last = match angles_rad.first() {
        Some(first) => *first,
        None => return unwrapped,
    };
    unwrapped.push(last);

    for pair in angles_rad.windows(2) {
        last = last + wrap_to_pi(pair[1] - pair[0]);
        unwrapped.push(last);
    }

    unwrapped
}
