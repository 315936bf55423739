//! Bootstrap confidence intervals for atom fraction excess.
//!
//! Each replicate resamples, per taxon, `n_light` control and `n_lab` treatment
//! W values with replacement and recomputes A. The interval bounds are the
//! `a/2` and `1 - a/2` empirical quantiles of the replicate A values.
//!
//! Every replicate seeds its own generator from the base seed and its index,
//! so parallel and sequential runs give identical intervals.
//!
//! # Example
//!
//! ```ignore
//! use sipkit::prelude::*;
//!
//! let atom_x = qsip_atom_excess(&table, &expr, Some("Replicate"), Isotope::C13)?;
//! let boot = qsip_bootstrap(&atom_x, Isotope::C13, &BootstrapConfig::default())?;
//! for row in boot.incorporators() {
//!     println!("{}\t{}", row.summary.taxon_id, row.summary.a);
//! }
//! ```

use super::atom_excess::atom_excess_from_w;
use super::isotope::Isotope;
use crate::data::{AtomExcess, BootstrapResults, BootstrapRow, WTable, WeightedDensity};
use crate::error::{Result, SipError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Configuration for bootstrap resampling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Number of (control, treatment) W values drawn per taxon and replicate.
    pub n_sample: (usize, usize),
    /// Number of bootstrap replicates.
    pub n_boot: usize,
    /// Two-sided significance level of the interval.
    pub a: f64,
    /// Random seed for reproducibility.
    pub seed: u64,
    /// Whether to run replicates in parallel.
    pub parallel: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_sample: (3, 3),
            n_boot: 10,
            a: 0.1,
            seed: 42,
            parallel: false,
        }
    }
}

impl BootstrapConfig {
    fn validate(&self) -> Result<()> {
        if self.n_boot == 0 {
            return Err(SipError::InvalidParameter(
                "n_boot must be at least 1".to_string(),
            ));
        }
        if !(self.a > 0.0 && self.a < 1.0) {
            return Err(SipError::InvalidParameter(format!(
                "Significance level a = {} must lie in (0, 1)",
                self.a
            )));
        }
        if self.n_sample.0 == 0 || self.n_sample.1 == 0 {
            return Err(SipError::InvalidParameter(format!(
                "n_sample ({}, {}) must be positive",
                self.n_sample.0, self.n_sample.1
            )));
        }
        Ok(())
    }
}

/// Observed W values of one taxon.
struct TaxonW<'a> {
    taxon_id: &'a str,
    light: Vec<f64>,
    lab: Vec<f64>,
}

fn group_by_taxon(w: &WTable) -> Vec<TaxonW<'_>> {
    let mut groups: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in &w.rows {
        let (light, lab) = groups.entry(row.taxon_id.as_str()).or_default();
        if row.is_control {
            light.push(row.w);
        } else {
            lab.push(row.w);
        }
    }
    groups
        .into_iter()
        .map(|(taxon_id, (light, lab))| TaxonW { taxon_id, light, lab })
        .collect()
}

/// Draw `n` values with replacement.
///
/// A single value is repeated `n` times; no values yields none.
fn sample_with_replacement<R: Rng>(values: &[f64], n: usize, rng: &mut R) -> Vec<f64> {
    match values.len() {
        0 => Vec::new(),
        1 => vec![values[0]; n],
        len => (0..n).map(|_| values[rng.gen_range(0..len)]).collect(),
    }
}

/// Resampled W table of one replicate.
fn resample_w<R: Rng>(groups: &[TaxonW<'_>], n_sample: (usize, usize), rng: &mut R) -> WTable {
    let mut rows = Vec::new();
    for group in groups {
        let draws = [
            (true, sample_with_replacement(&group.light, n_sample.0, rng)),
            (false, sample_with_replacement(&group.lab, n_sample.1, rng)),
        ];
        for (is_control, values) in draws {
            rows.extend(values.into_iter().enumerate().map(|(i, w)| WeightedDensity {
                taxon_id: group.taxon_id.to_string(),
                is_control,
                replicate: Some((i + 1).to_string()),
                w,
            }));
        }
    }
    WTable { rows }
}

/// Empirical quantile with linear interpolation between order statistics
/// (Hyndman-Fan type 7).
///
/// Non-finite values are excluded; returns NaN when nothing remains.
pub fn quantile(values: &[f64], p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Bootstrap confidence intervals of atom fraction excess.
///
/// # Arguments
/// * `atom_x` - Output of [`qsip_atom_excess`](super::qsip_atom_excess)
/// * `isotope` - Labeling isotope used to recompute A
/// * `config` - Resampling settings
///
/// # Returns
/// One row per taxon of the A summary, with `A_CI_low`/`A_CI_high` added.
pub fn qsip_bootstrap(
    atom_x: &AtomExcess,
    isotope: Isotope,
    config: &BootstrapConfig,
) -> Result<BootstrapResults> {
    config.validate()?;
    if isotope != atom_x.isotope {
        log::warn!(
            "Bootstrapping with {} although atom excess was computed for {}",
            isotope,
            atom_x.isotope
        );
    }

    let groups = group_by_taxon(&atom_x.w);
    let gc = (!atom_x.gc_content.is_empty()).then_some(&atom_x.gc_content);

    log::info!(
        "Running {} bootstrap replicates for {} taxa",
        config.n_boot,
        groups.len()
    );

    let run_replicate = |boot_idx: usize| -> Vec<(String, f64)> {
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(boot_idx as u64));
        let w = resample_w(&groups, config.n_sample, &mut rng);
        atom_excess_from_w(&w, isotope, gc)
            .into_iter()
            .map(|row| (row.taxon_id, row.a))
            .collect()
    };

    let replicates: Vec<Vec<(String, f64)>> = if config.parallel {
        (0..config.n_boot).into_par_iter().map(run_replicate).collect()
    } else {
        (0..config.n_boot).map(run_replicate).collect()
    };

    let mut boot_a: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for replicate in replicates {
        for (taxon_id, a) in replicate {
            boot_a.entry(taxon_id).or_default().push(a);
        }
    }

    let p_low = config.a / 2.0;
    let p_high = 1.0 - config.a / 2.0;
    let rows: Vec<BootstrapRow> = atom_x
        .a
        .iter()
        .filter_map(|summary| {
            let values = boot_a.get(&summary.taxon_id)?;
            Some(BootstrapRow {
                summary: summary.clone(),
                a_ci_low: quantile(values, p_low),
                a_ci_high: quantile(values, p_high),
            })
        })
        .collect();

    log::debug!("Bootstrap intervals computed for {} taxa", rows.len());

    Ok(BootstrapResults {
        isotope,
        n_boot: config.n_boot,
        a: config.a,
        rows,
    })
}
