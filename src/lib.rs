//! Stable Isotope Probing (SIP) analysis library
//!
//! This library provides primitives for analysing DNA-SIP experiments, where
//! sequenced density gradient fractions reveal which taxa assimilated an
//! isotopically labeled substrate.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (abundance tables, metadata, control expressions, results)
//! - **format**: Casting raw tables into typed fraction records
//! - **normalize**: Relative abundance and qPCR rescaling
//! - **interpolate**: Density-grid interpolation of abundance profiles
//! - **shift**: Center-of-mass density shift (delta BD)
//! - **qsip**: Weighted densities, atom fraction excess and bootstrap intervals
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use sipkit::prelude::*;
//!
//! let table = AbundanceTable::from_tsv("fractions.tsv").unwrap();
//! let control = ControlExpr::parse("substrate == '12C-Con'").unwrap();
//!
//! let shifts = delta_bd(&table, &control, &DeltaBdConfig::default()).unwrap();
//!
//! let atom_x = qsip_atom_excess(&table, &control, Some("Replicate"), Isotope::C13).unwrap();
//! let boot = qsip_bootstrap(&atom_x, Isotope::C13, &BootstrapConfig::default()).unwrap();
//! ```

pub mod data;
pub mod error;
pub mod format;
pub mod interpolate;
pub mod normalize;
pub mod pipeline;
pub mod qsip;
pub mod shift;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        AbundanceRow, AbundanceTable, AtomExcess, AtomExcessRow, BootstrapResults, BootstrapRow,
        ControlExpr, ControlPredicate, CountMatrix, DeltaBdResult, DeltaBdResultSet,
        FractionRecord, FractionTable, Metadata, SampleView, Variable, WTable, WeightedDensity,
    };
    pub use crate::error::{Result, SipError};
    pub use crate::format::format_table;
    pub use crate::interpolate::{interpolate, InterpolatedProfile};
    pub use crate::normalize::{qpcr_rescale, read_qpcr_tsv, relative_abundance};
    pub use crate::pipeline::{InputConfig, OutputConfig, Pipeline, PipelineStep, SipConfig};
    pub use crate::qsip::{
        atom_excess_from_w, qsip_atom_excess, qsip_atom_excess_with_gc, qsip_bootstrap,
        weighted_densities, BootstrapConfig, Isotope,
    };
    pub use crate::shift::{delta_bd, delta_bd_formatted, DeltaBdConfig};
}
