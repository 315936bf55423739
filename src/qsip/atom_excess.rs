//! Atom fraction excess of the heavy isotope per taxon.
//!
//! The weighted densities of unlabeled (control) and labeled (treatment)
//! gradients are averaged per taxon, and the density shift between them is
//! converted to a molecular weight shift:
//!
//! ```text
//! Z          = Wlab - Wlight
//! Gi         = (Wlight - 1.646057) / 0.083506
//! Mlight     = 0.496 * Gi + 307.691
//! Mheavymax  = isotope-specific, see Isotope::max_heavy_weight
//! Mlab       = (Z / Wlight + 1) * Mlight
//! A          = (Mlab - Mlight) / (Mheavymax - Mlight) * (1 - x)
//! ```
//!
//! where `x` is the natural abundance of the heavy isotope.

use super::isotope::Isotope;
use super::weighted::weighted_densities;
use crate::data::{AbundanceTable, AtomExcess, AtomExcessRow, ControlPredicate, WTable};
use crate::error::Result;
use crate::format::format_table;
use std::collections::BTreeMap;

/// GC fraction estimated from the buoyant density of unlabeled DNA.
pub fn gc_from_density(wlight: f64) -> f64 {
    (wlight - 1.646057) / 0.083506
}

/// Evaluate the molecular weight chain for one taxon.
///
/// `gc` overrides the density-derived GC fraction when given. Degenerate
/// input (undefined densities, `wlight == 0`) yields NaN for `mlab` and `a`.
pub fn atom_excess_row(
    taxon_id: &str,
    wlight: f64,
    wlab: f64,
    isotope: Isotope,
    gc: Option<f64>,
) -> AtomExcessRow {
    let z = wlab - wlight;
    let gi = gc.unwrap_or_else(|| gc_from_density(wlight));
    let mlight = 0.496 * gi + 307.691;
    let mheavymax = isotope.max_heavy_weight(mlight, gi);
    let mlab = undefined_if_infinite((z / wlight + 1.0) * mlight);
    let a = undefined_if_infinite(
        (mlab - mlight) / (mheavymax - mlight) * (1.0 - isotope.natural_abundance()),
    );

    AtomExcessRow {
        taxon_id: taxon_id.to_string(),
        wlight,
        wlab,
        z,
        gi,
        mlight,
        mheavymax,
        mlab,
        a,
    }
}

/// Division by zero is undefined, not infinite.
fn undefined_if_infinite(value: f64) -> f64 {
    if value.is_infinite() {
        f64::NAN
    } else {
        value
    }
}

/// Mean of the defined values; NaN if there are none.
fn nan_mean(values: &[f64]) -> f64 {
    let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if defined.is_empty() {
        f64::NAN
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    }
}

/// Per-taxon atom fraction excess from a table of weighted densities.
///
/// # Arguments
/// * `w` - Weighted densities, any number of replicates per group
/// * `isotope` - Labeling isotope
/// * `gc` - Optional per-taxon GC fractions
///
/// # Returns
/// One row per taxon present in `w`, sorted by taxon ID.
pub fn atom_excess_from_w(
    w: &WTable,
    isotope: Isotope,
    gc: Option<&BTreeMap<String, f64>>,
) -> Vec<AtomExcessRow> {
    // taxon -> (control W values, treatment W values)
    let mut by_taxon: BTreeMap<&str, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in &w.rows {
        let (light, lab) = by_taxon.entry(row.taxon_id.as_str()).or_default();
        if row.is_control {
            light.push(row.w);
        } else {
            lab.push(row.w);
        }
    }

    by_taxon
        .into_iter()
        .map(|(taxon, (light, lab))| {
            let supplied = gc.and_then(|m| m.get(taxon)).copied();
            atom_excess_row(taxon, nan_mean(&light), nan_mean(&lab), isotope, supplied)
        })
        .collect()
}

/// Compute weighted densities and atom fraction excess from a raw table.
///
/// # Arguments
/// * `table` - Raw abundance table
/// * `predicate` - Classifies samples as unlabeled control (`true`) or labeled
/// * `replicate_column` - Metadata column naming the gradient replicate; with
///   `None` all gradients of a group are pooled into one W value
/// * `isotope` - Labeling isotope
pub fn qsip_atom_excess<P>(
    table: &AbundanceTable,
    predicate: &P,
    replicate_column: Option<&str>,
    isotope: Isotope,
) -> Result<AtomExcess>
where
    P: ControlPredicate + ?Sized,
{
    qsip_atom_excess_with_gc(table, predicate, replicate_column, isotope, &BTreeMap::new())
}

/// As [`qsip_atom_excess`], with caller-supplied GC fractions.
///
/// Taxa missing from `gc` use the GC fraction estimated from `Wlight`.
pub fn qsip_atom_excess_with_gc<P>(
    table: &AbundanceTable,
    predicate: &P,
    replicate_column: Option<&str>,
    isotope: Isotope,
    gc: &BTreeMap<String, f64>,
) -> Result<AtomExcess>
where
    P: ControlPredicate + ?Sized,
{
    let formatted = format_table(table, predicate, replicate_column)?;
    let w = weighted_densities(&formatted);
    let a = atom_excess_from_w(&w, isotope, Some(gc));

    log::info!(
        "Computed {} atom fraction excess for {} taxa from {} weighted densities",
        isotope,
        a.len(),
        w.len()
    );

    Ok(AtomExcess {
        isotope,
        w,
        a,
        gc_content: gc.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::WeightedDensity;
    use approx::assert_relative_eq;

    fn w_row(taxon: &str, is_control: bool, rep: &str, w: f64) -> WeightedDensity {
        WeightedDensity {
            taxon_id: taxon.to_string(),
            is_control,
            replicate: Some(rep.to_string()),
            w,
        }
    }

    #[test]
    fn test_c13_closed_form() {
        let row = atom_excess_row("OTU.1", 1.700, 1.704, Isotope::C13, None);

        let gi = (1.700 - 1.646057) / 0.083506;
        let mlight = 0.496 * gi + 307.691;
        let mheavymax = -0.4987282 * gi + 9.974564 + mlight;
        let mlab = (0.004 / 1.700 + 1.0) * mlight;
        let a = (mlab - mlight) / (mheavymax - mlight) * (1.0 - 0.01111233);

        assert_relative_eq!(row.z, 0.004, epsilon = 1e-12);
        assert_relative_eq!(row.gi, gi, epsilon = 1e-12);
        assert_relative_eq!(row.mlight, mlight, epsilon = 1e-9);
        assert_relative_eq!(row.mheavymax, mheavymax, epsilon = 1e-9);
        assert_relative_eq!(row.mlab, mlab, epsilon = 1e-9);
        assert_relative_eq!(row.a, a, epsilon = 1e-12);
        assert_relative_eq!(row.a, 0.0742, epsilon = 1e-3);
    }

    #[test]
    fn test_o18_heavy_weight() {
        for wlight in [1.68, 1.70, 1.73] {
            let row = atom_excess_row("OTU.1", wlight, wlight + 0.01, Isotope::O18, None);
            assert_relative_eq!(row.mheavymax, row.mlight + 12.07747, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_zero_wlight_is_nan() {
        let row = atom_excess_row("OTU.1", 0.0, 1.7, Isotope::C13, None);
        assert_relative_eq!(row.z, 1.7, epsilon = 1e-12);
        assert!(row.mlab.is_nan());
        assert!(row.a.is_nan());

        let row = atom_excess_row("OTU.1", 0.0, -1.7, Isotope::O18, None);
        assert!(row.mlab.is_nan());
        assert!(row.a.is_nan());
    }

    #[test]
    fn test_replicate_means_ignore_nan() {
        let w = WTable {
            rows: vec![
                w_row("OTU.1", true, "1", 1.70),
                w_row("OTU.1", true, "2", 1.72),
                w_row("OTU.1", true, "3", f64::NAN),
                w_row("OTU.1", false, "4", 1.73),
                w_row("OTU.2", true, "1", 1.71),
            ],
        };
        let rows = atom_excess_from_w(&w, Isotope::C13, None);

        assert_eq!(rows.len(), 2);
        assert_relative_eq!(rows[0].wlight, 1.71, epsilon = 1e-12);
        assert_relative_eq!(rows[0].wlab, 1.73, epsilon = 1e-12);
        assert_relative_eq!(rows[0].z, 0.02, epsilon = 1e-12);

        // no labeled gradients
        assert_eq!(rows[1].taxon_id, "OTU.2");
        assert!(rows[1].wlab.is_nan());
        assert!(rows[1].a.is_nan());
    }

    #[test]
    fn test_supplied_gc_overrides_estimate() {
        let w = WTable {
            rows: vec![
                w_row("OTU.1", true, "1", 1.70),
                w_row("OTU.1", false, "2", 1.71),
                w_row("OTU.2", true, "1", 1.70),
                w_row("OTU.2", false, "2", 1.71),
            ],
        };
        let gc: BTreeMap<String, f64> = [("OTU.1".to_string(), 0.5)].into_iter().collect();
        let rows = atom_excess_from_w(&w, Isotope::C13, Some(&gc));

        assert_eq!(rows[0].gi, 0.5);
        assert_relative_eq!(rows[0].mlight, 0.496 * 0.5 + 307.691, epsilon = 1e-9);
        assert_relative_eq!(rows[1].gi, gc_from_density(1.70), epsilon = 1e-12);
    }
}
