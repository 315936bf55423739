//! Center-of-mass buoyant density shift (delta BD).
//!
//! A taxon that assimilated the heavy isotope moves to denser fractions in
//! labeled gradients. The shift is measured by comparing the center of mass
//! of its density profile in treatment and control gradients.
//!
//! # Algorithm
//!
//! 1. Convert counts to relative abundances within each fraction sample
//! 2. For each (taxon, control flag) group, interpolate the abundances onto an
//!    `n`-point density grid spanning `[BD_min, BD_max]`
//! 3. Center of mass (CM) = abundance-weighted mean density of the grid
//! 4. delta_BD = CM_treatment - CM_control
//!
//! # Example
//!
//! ```ignore
//! use sipkit::prelude::*;
//!
//! let expr = ControlExpr::parse("substrate == '12C-Con'")?;
//! let shifts = delta_bd(&table, &expr, &DeltaBdConfig::default())?;
//! ```

use crate::data::{
    AbundanceTable, ControlPredicate, DeltaBdResult, DeltaBdResultSet, FractionTable,
};
use crate::error::{Result, SipError};
use crate::format::format_table;
use crate::interpolate::interpolate;
use crate::normalize::relative_abundance;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings of the delta-BD calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaBdConfig {
    /// Number of grid points for interpolation.
    pub n: usize,
    /// Lower grid bound; defaults to the smallest observed density.
    pub bd_min: Option<f64>,
    /// Upper grid bound; defaults to the largest observed density.
    pub bd_max: Option<f64>,
    /// Whether to interpolate groups in parallel.
    pub parallel: bool,
}

impl Default for DeltaBdConfig {
    fn default() -> Self {
        Self {
            n: 20,
            bd_min: None,
            bd_max: None,
            parallel: true,
        }
    }
}

impl DeltaBdConfig {
    /// Use a fixed density range for the grid.
    pub fn with_range(mut self, bd_min: f64, bd_max: f64) -> Self {
        self.bd_min = Some(bd_min);
        self.bd_max = Some(bd_max);
        self
    }
}

/// Compute delta BD for every taxon of a raw abundance table.
///
/// # Arguments
/// * `table` - Raw abundance table
/// * `predicate` - Classifies samples as control (`true`) or labeled treatment
/// * `config` - Grid settings
///
/// # Returns
/// One result per taxon, sorted by taxon ID. Taxa observed in only one of the
/// two groups are kept with NaN for the missing center of mass and the shift.
pub fn delta_bd<P>(
    table: &AbundanceTable,
    predicate: &P,
    config: &DeltaBdConfig,
) -> Result<DeltaBdResultSet>
where
    P: ControlPredicate + ?Sized,
{
    let formatted = format_table(table, predicate, None)?;
    delta_bd_formatted(&formatted, config)
}

/// Compute delta BD on an already formatted table.
pub fn delta_bd_formatted(table: &FractionTable, config: &DeltaBdConfig) -> Result<DeltaBdResultSet> {
    let (observed_min, observed_max) = table
        .density_range()
        .ok_or_else(|| SipError::EmptyData("No fractions to compute delta BD".to_string()))?;
    let bd_min = config.bd_min.unwrap_or(observed_min);
    let bd_max = config.bd_max.unwrap_or(observed_max);

    let relative = relative_abundance(table);

    let mut groups: BTreeMap<(&str, bool), Vec<(f64, f64)>> = BTreeMap::new();
    for r in relative.iter() {
        groups
            .entry((r.taxon_id.as_str(), r.is_control))
            .or_default()
            .push((r.buoyant_density, r.count));
    }
    let groups: Vec<((&str, bool), Vec<(f64, f64)>)> = groups.into_iter().collect();

    log::debug!(
        "Interpolating {} (taxon, control) groups on a {}-point grid over [{}, {}]",
        groups.len(),
        config.n,
        bd_min,
        bd_max
    );

    let center_of_mass = |points: &[(f64, f64)]| -> Result<f64> {
        Ok(interpolate(points, config.n, bd_min, bd_max)?.center_of_mass())
    };
    let centers: Vec<Result<f64>> = if config.parallel {
        groups
            .par_iter()
            .map(|(_, points)| center_of_mass(points.as_slice()))
            .collect()
    } else {
        groups
            .iter()
            .map(|(_, points)| center_of_mass(points.as_slice()))
            .collect()
    };

    // taxon -> (CM_control, CM_treatment)
    let mut pivot: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for (((taxon, is_control), _), cm) in groups.iter().zip(centers) {
        let cm = cm?;
        let entry = pivot.entry(*taxon).or_insert((f64::NAN, f64::NAN));
        if *is_control {
            entry.0 = cm;
        } else {
            entry.1 = cm;
        }
    }

    let results: Vec<DeltaBdResult> = pivot
        .into_iter()
        .map(|(taxon, (cm_control, cm_treatment))| DeltaBdResult {
            taxon_id: taxon.to_string(),
            cm_control,
            cm_treatment,
            delta_bd: cm_treatment - cm_control,
        })
        .collect();

    log::info!("Computed delta BD for {} taxa", results.len());

    Ok(DeltaBdResultSet {
        n: config.n,
        bd_min,
        bd_max,
        results,
    })
}
