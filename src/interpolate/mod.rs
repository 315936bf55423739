//! Interpolation of abundance profiles onto a fixed buoyant density grid.

pub mod linear;

pub use linear::{density_grid, interpolate, InterpolatedProfile};
