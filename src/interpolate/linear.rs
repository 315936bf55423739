//! Piecewise-linear interpolation over buoyant density.
//!
//! Gradients are fractionated at slightly different densities, so profiles
//! from different gradients only become comparable once they are resampled
//! onto a shared grid of `n` evenly spaced densities.
//!
//! # Rules
//!
//! 1. Observations with an undefined value are dropped.
//! 2. Observations sharing a density are collapsed to their mean value.
//! 3. Grid points outside the observed density range are zero.
//! 4. With a single distinct density, the grid point(s) equal to that density
//!    take its value and every other point is zero.

use crate::error::{Result, SipError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Abundance profile sampled on an evenly spaced density grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedProfile {
    pub densities: Vec<f64>,
    pub values: Vec<f64>,
}

impl InterpolatedProfile {
    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.densities.len()
    }

    /// Check if the grid is empty.
    pub fn is_empty(&self) -> bool {
        self.densities.is_empty()
    }

    /// Abundance-weighted mean density; NaN when the profile sums to zero.
    pub fn center_of_mass(&self) -> f64 {
        let total: f64 = self.values.iter().sum();
        if total == 0.0 {
            return f64::NAN;
        }
        let weighted: f64 = self
            .densities
            .iter()
            .zip(&self.values)
            .map(|(d, v)| d * v)
            .sum();
        weighted / total
    }
}

/// `n` evenly spaced densities from `bd_min` to `bd_max`, both included.
///
/// A single-point grid is `[bd_min]`.
pub fn density_grid(n: usize, bd_min: f64, bd_max: f64) -> Result<Vec<f64>> {
    if n == 0 {
        return Err(SipError::InvalidParameter(
            "Interpolation grid needs at least one point".to_string(),
        ));
    }
    if !bd_min.is_finite() || !bd_max.is_finite() {
        return Err(SipError::InvalidParameter(format!(
            "Density range [{}, {}] must be finite",
            bd_min, bd_max
        )));
    }
    if bd_min > bd_max {
        return Err(SipError::InvalidParameter(format!(
            "BD_min ({}) must not exceed BD_max ({})",
            bd_min, bd_max
        )));
    }
    if n == 1 {
        return Ok(vec![bd_min]);
    }

    let step = (bd_max - bd_min) / (n - 1) as f64;
    let mut grid: Vec<f64> = (0..n).map(|i| bd_min + step * i as f64).collect();
    grid[n - 1] = bd_max;
    Ok(grid)
}

/// Interpolate `(density, value)` observations onto the density grid.
///
/// # Arguments
/// * `points` - Observations of one group, in any order
/// * `n` - Number of grid points
/// * `bd_min`, `bd_max` - Grid bounds
pub fn interpolate(
    points: &[(f64, f64)],
    n: usize,
    bd_min: f64,
    bd_max: f64,
) -> Result<InterpolatedProfile> {
    let densities = density_grid(n, bd_min, bd_max)?;
    let knots = collapse_ties(points);

    let values = densities
        .iter()
        .map(|&x| evaluate(&knots, x))
        .collect();

    Ok(InterpolatedProfile { densities, values })
}

/// Sorted distinct densities with the mean value observed at each.
fn collapse_ties(points: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut usable: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|(d, v)| d.is_finite() && !v.is_nan())
        .collect();
    usable.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut knots: Vec<(f64, f64)> = Vec::with_capacity(usable.len());
    let mut i = 0;
    while i < usable.len() {
        let density = usable[i].0;
        let mut j = i;
        let mut sum = 0.0;
        while j < usable.len() && usable[j].0 == density {
            sum += usable[j].1;
            j += 1;
        }
        knots.push((density, sum / (j - i) as f64));
        i = j;
    }
    knots
}

fn evaluate(knots: &[(f64, f64)], x: f64) -> f64 {
    let (first, last) = match (knots.first(), knots.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return 0.0,
    };
    if x < first.0 || x > last.0 {
        return 0.0;
    }

    let idx = knots.partition_point(|&(d, _)| d < x);
    let (x1, y1) = knots[idx];
    if x1 == x {
        return y1;
    }
    // idx > 0 here: x > first.0 and x is not a knot
    let (x0, y0) = knots[idx - 1];
    let y = y0 + (y1 - y0) * (x - x0) / (x1 - x0);
    if y.is_finite() {
        y
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_point_profile() {
        let profile = interpolate(&[(1.70, 10.0), (1.75, 20.0)], 3, 1.70, 1.75).unwrap();

        assert_eq!(profile.len(), 3);
        assert_relative_eq!(profile.densities[1], 1.725, epsilon = 1e-12);
        assert_relative_eq!(profile.values[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(profile.values[1], 15.0, epsilon = 1e-9);
        assert_relative_eq!(profile.values[2], 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_outside_range_is_zero() {
        let profile = interpolate(&[(1.70, 10.0), (1.72, 20.0)], 5, 1.66, 1.76).unwrap();
        assert_eq!(profile.values[0], 0.0); // 1.66
        assert_eq!(profile.values[1], 0.0); // 1.685
        assert_eq!(profile.values[3], 0.0); // 1.735
        assert_eq!(profile.values[4], 0.0); // 1.76
        // 1.71 sits halfway between the two observations
        assert_relative_eq!(profile.values[2], 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unsorted_input_and_ties() {
        let points = [(1.75, 20.0), (1.70, 8.0), (1.70, 12.0)];
        let profile = interpolate(&points, 3, 1.70, 1.75).unwrap();
        assert_relative_eq!(profile.values[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(profile.values[1], 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_nan_values_dropped() {
        let points = [(1.70, 10.0), (1.72, f64::NAN), (1.75, 20.0)];
        let profile = interpolate(&points, 3, 1.70, 1.75).unwrap();
        assert_relative_eq!(profile.values[1], 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_point_is_zero_elsewhere() {
        let profile = interpolate(&[(1.70, 5.0)], 3, 1.70, 1.75).unwrap();
        assert_eq!(profile.values, vec![5.0, 0.0, 0.0]);

        let off_grid = interpolate(&[(1.71, 5.0)], 3, 1.70, 1.75).unwrap();
        assert_eq!(off_grid.values, vec![0.0, 0.0, 0.0]);
        assert!(off_grid.center_of_mass().is_nan());
    }

    #[test]
    fn test_empty_points() {
        let profile = interpolate(&[], 4, 1.70, 1.75).unwrap();
        assert!(profile.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_center_of_mass() {
        let profile = InterpolatedProfile {
            densities: vec![1.70, 1.72, 1.74],
            values: vec![1.0, 2.0, 1.0],
        };
        assert_relative_eq!(profile.center_of_mass(), 1.72, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_validation() {
        assert!(density_grid(0, 1.7, 1.8).is_err());
        assert!(density_grid(3, 1.8, 1.7).is_err());
        assert!(density_grid(3, f64::NAN, 1.7).is_err());
        assert_eq!(density_grid(1, 1.7, 1.8).unwrap(), vec![1.7]);

        let grid = density_grid(20, 1.66, 1.77).unwrap();
        assert_eq!(grid.len(), 20);
        assert_eq!(grid[0], 1.66);
        assert_eq!(grid[19], 1.77);
    }
}
