//! Localisation of a position on the path and extraction of the path ahead of it

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::Vector2;
use serde::Serialize;

use util::maths::{clamp, wrap_to_period};

use super::{InputError, OutOfRange, RefPathError, ReferencePath};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Where a position lies along the path.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Localisation {
    /// Arc length of the closest point on the path.
    pub arc_length_m: f64,

    /// The closest point on the path.
    pub closest_m: Vector2<f64>,

    /// Signed distance from the path, positive when the position is to the right of it.
    pub lateral_error_m: f64,
}

/// Points the vehicle should reach at a fixed time interval from its current position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Horizon {
    pub localisation: Localisation,

    /// Time of each point along the path.
    pub times_s: Vec<f64>,

    pub points_m: Vec<Vector2<f64>>,
}

/// Projection of a position onto one element of the path.
#[derive(Debug, Copy, Clone)]
struct Projection {
    /// Index of the element's first point.
    element: usize,

    /// Position along the element before clamping, 0 at the start and 1 at the end.
    u_raw: f64,

    closest_m: Vector2<f64>,
    arc_length_m: f64,
    distance_m: f64,
    lateral_error_m: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReferencePath {
    /// Find the arc length of the point on the path closest to `position_m`.
    ///
    /// Only points within `tolerance_m` of `guess_m` along the path are searched. The closest of
    /// those is refined by projecting onto the elements either side of it.
    ///
    /// On open paths the search window is clipped to the path. Positions which project before the
    /// start, past the end, or outside the window are rejected.
    pub fn localise(
        &self,
        position_m: &Vector2<f64>,
        guess_m: f64,
        tolerance_m: f64,
    ) -> Result<Localisation, RefPathError> {
        if !(position_m.x.is_finite() && position_m.y.is_finite()) {
            return Err(InputError::InvalidQuery {
                name: "position_m",
                value: if position_m.x.is_finite() {
                    position_m.y
                } else {
                    position_m.x
                },
            }
            .into());
        }
        if !guess_m.is_finite() {
            return Err(InputError::InvalidQuery {
                name: "guess_m",
                value: guess_m,
            }
            .into());
        }
        if !(tolerance_m.is_finite() && tolerance_m >= 0.0) {
            return Err(InputError::InvalidQuery {
                name: "tolerance_m",
                value: tolerance_m,
            }
            .into());
        }

        let out_of_range = |reason| RefPathError::LocalisationOutOfRange {
            guess_m,
            tolerance_m,
            reason,
        };

        // Open paths only search the elements between the window's end points
        let (candidates, window_elements) = match self.is_closed() {
            true => (self.closed_window(guess_m, tolerance_m), None),
            false => {
                let (first, stop) = self
                    .open_window(guess_m, tolerance_m)
                    .ok_or_else(|| out_of_range(OutOfRange::WindowOutsidePath))?;
                ((first..=stop).collect::<Vec<_>>(), Some((first, stop - 1)))
            }
        };

        let points = self.points_m();
        let nearest = candidates
            .into_iter()
            .min_by(|&a, &b| {
                let da = (points[a] - position_m).norm_squared();
                let db = (points[b] - position_m).norm_squared();
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| out_of_range(OutOfRange::WindowOutsidePath))?;

        let best = self
            .adjacent_elements(nearest)
            .iter()
            .flatten()
            .filter(|&&element| match window_elements {
                Some((lo, hi)) => element >= lo && element <= hi,
                None => true,
            })
            .map(|&element| self.project(element, position_m))
            .min_by(|a, b| {
                a.distance_m
                    .partial_cmp(&b.distance_m)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| out_of_range(OutOfRange::WindowOutsidePath))?;

        // A projection clamped to either edge of the window lies outside it
        if let Some((lo, hi)) = window_elements {
            let last_element = self.len() - 2;
            if best.element == lo && best.u_raw < 0.0 {
                return Err(out_of_range(match lo {
                    0 => OutOfRange::BeforeStart,
                    _ => OutOfRange::OutsideWindow,
                }));
            }
            if best.element == hi && best.u_raw > 1.0 {
                return Err(out_of_range(match hi == last_element {
                    true => OutOfRange::PastEnd,
                    false => OutOfRange::OutsideWindow,
                }));
            }
        }

        trace!(
            "Localised {:?} at s = {:.3} m (nearest point {}, element {})",
            position_m,
            best.arc_length_m,
            nearest,
            best.element
        );

        Ok(Localisation {
            arc_length_m: best.arc_length_m,
            closest_m: best.closest_m,
            lateral_error_m: best.lateral_error_m,
        })
    }

    /// Localise a position, then sample the path at `horizon_len` times spaced by
    /// `sampling_interval_s` starting from the position's passage time.
    ///
    /// Closed paths wrap the times modulo the lap time, open paths clamp them to the end.
    pub fn extract_horizon(
        &self,
        horizon_len: usize,
        sampling_interval_s: f64,
        position_m: &Vector2<f64>,
        guess_m: f64,
        tolerance_m: f64,
    ) -> Result<Horizon, RefPathError> {
        if !(sampling_interval_s.is_finite() && sampling_interval_s > 0.0) {
            return Err(InputError::InvalidQuery {
                name: "sampling_interval_s",
                value: sampling_interval_s,
            }
            .into());
        }

        let localisation = self.localise(position_m, guess_m, tolerance_m)?;
        let t_ref_s = self.time_at_arc_length(localisation.arc_length_m);
        let total_time_s = self.total_time_s();

        let times_s: Vec<f64> = (0..horizon_len)
            .map(|k| {
                let t_s = t_ref_s + k as f64 * sampling_interval_s;
                match self.is_closed() {
                    true => wrap_to_period(t_s, total_time_s),
                    false => t_s.min(total_time_s),
                }
            })
            .collect();

        let points_m = times_s.iter().map(|&t| self.position_at_time(t)).collect();

        Ok(Horizon {
            localisation,
            times_s,
            points_m,
        })
    }

    /// Indices of points within `tolerance_m` of `guess_m`, measured around the loop.
    fn closed_window(&self, guess_m: f64, tolerance_m: f64) -> Vec<usize> {
        let length_m = self.total_length_m();
        let s = self.arc_length_m();

        if 2.0 * tolerance_m >= length_m {
            return (0..s.len()).collect();
        }

        let guess_m = wrap_to_period(guess_m, length_m);
        let mut window: Vec<usize> = s
            .iter()
            .enumerate()
            .filter(|(_, s_i)| {
                let d = (**s_i - guess_m).abs();
                d.min(length_m - d) <= tolerance_m
            })
            .map(|(i, _)| i)
            .collect();

        // A tolerance smaller than the point spacing can fall between two points
        if window.is_empty() {
            let before = s.partition_point(|&s_i| s_i <= guess_m).saturating_sub(1);
            window.push(before);
            window.push((before + 1) % s.len());
        }

        window
    }

    /// First and last indices of the points covering `[guess - tol, guess + tol]` clipped to the
    /// path, or `None` if the window misses the path. The window always spans at least one
    /// element.
    fn open_window(&self, guess_m: f64, tolerance_m: f64) -> Option<(usize, usize)> {
        let s = self.arc_length_m();
        let last = s.len() - 1;

        let s_min = (guess_m - tolerance_m).max(0.0);
        let s_max = (guess_m + tolerance_m).min(self.total_length_m());
        if s_min > s_max {
            return None;
        }

        // From the last point at or before the window to the first point at or after it
        let mut first = s.partition_point(|&s_i| s_i <= s_min).saturating_sub(1);
        let mut stop = s.partition_point(|&s_i| s_i < s_max).min(last);

        if first == stop {
            match stop < last {
                true => stop += 1,
                false => first -= 1,
            }
        }

        Some((first, stop))
    }

    /// The elements either side of a point, as the indices of their first points.
    fn adjacent_elements(&self, index: usize) -> [Option<usize>; 2] {
        let n = self.len();

        match self.is_closed() {
            true => [Some((index + n - 1) % n), Some(index)],
            false => [
                if index > 0 { Some(index - 1) } else { None },
                if index + 1 < n { Some(index) } else { None },
            ],
        }
    }

    fn project(&self, element: usize, position_m: &Vector2<f64>) -> Projection {
        let points = self.points_m();
        let s = self.arc_length_m();
        let n = points.len();

        let next = (element + 1) % n;
        let start = points[element];
        let end = points[next];
        let s_start = s[element];
        let s_end = if next == 0 {
            self.total_length_m()
        } else {
            s[next]
        };

        let dir = end - start;
        let len_sq = dir.norm_squared();
        let rel = position_m - start;

        let u_raw = match len_sq > 0.0 {
            true => rel.dot(&dir) / len_sq,
            false => 0.0,
        };
        let u = clamp(u_raw, 0.0, 1.0);

        let closest_m = start + dir * u;
        let offset = position_m - closest_m;

        // Cross product of the element direction with the offset is negative on the right
        let cross = dir.x * offset.y - dir.y * offset.x;
        let distance_m = offset.norm();
        let lateral_error_m = if cross > 0.0 { -distance_m } else { distance_m };

        let mut arc_length_m = s_start + u * (s_end - s_start);
        if self.is_closed() {
            arc_length_m = wrap_to_period(arc_length_m, self.total_length_m());
        }

        Projection {
            element,
            u_raw,
            closest_m,
            arc_length_m,
            distance_m,
            lateral_error_m,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
