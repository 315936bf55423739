//! Quantitative stable isotope probing (q-SIP).
//!
//! - **weighted**: count-weighted mean buoyant density (W) per gradient replicate
//! - **atom_excess**: molecular weight and atom fraction excess formulas
//! - **bootstrap**: resampling confidence intervals for atom fraction excess

pub mod atom_excess;
pub mod bootstrap;
pub mod isotope;
pub mod weighted;

pub use atom_excess::{
    atom_excess_from_w, atom_excess_row, gc_from_density, qsip_atom_excess,
    qsip_atom_excess_with_gc,
};
pub use bootstrap::{qsip_bootstrap, quantile, BootstrapConfig};
pub use isotope::Isotope;
pub use weighted::{weighted_densities, weighted_mean};
