//! Weighted mean buoyant density (W) of each taxon in each gradient.
//!
//! ```text
//! W = sum_i(count_i * BD_i) / sum_i(count_i)
//! ```
//!
//! computed over the fractions of one (taxon, control flag, replicate) group.

use crate::data::{FractionTable, WTable, WeightedDensity};
use std::collections::BTreeMap;

/// Weighted mean of `values` by `weights`.
///
/// Pairs with an undefined weight are skipped. Returns NaN when the remaining
/// weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let (sum_wx, sum_w) = values
        .iter()
        .zip(weights)
        .filter(|(_, w)| !w.is_nan())
        .fold((0.0, 0.0), |(sx, sw), (x, w)| (sx + x * w, sw + w));
    if sum_w == 0.0 {
        f64::NAN
    } else {
        sum_wx / sum_w
    }
}

/// Compute W for every (taxon, control flag, replicate) group.
///
/// Rows are sorted by taxon, then control flag (treatment first), then replicate.
pub fn weighted_densities(table: &FractionTable) -> WTable {
    let mut groups: BTreeMap<(&str, bool, Option<&str>), (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for r in table.iter() {
        let (densities, counts) = groups
            .entry((r.taxon_id.as_str(), r.is_control, r.replicate.as_deref()))
            .or_default();
        densities.push(r.buoyant_density);
        counts.push(r.count);
    }

    let rows: Vec<WeightedDensity> = groups
        .into_iter()
        .map(|((taxon, is_control, replicate), (densities, counts))| WeightedDensity {
            taxon_id: taxon.to_string(),
            is_control,
            replicate: replicate.map(String::from),
            w: weighted_mean(&densities, &counts),
        })
        .collect();

    log::debug!("Computed {} weighted mean densities", rows.len());
    WTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FractionRecord;
    use approx::assert_relative_eq;

    fn record(taxon: &str, is_control: bool, rep: &str, bd: f64, count: f64) -> FractionRecord {
        FractionRecord {
            taxon_id: taxon.to_string(),
            sample_id: format!("{}-{}", rep, bd),
            replicate: Some(rep.to_string()),
            is_control,
            buoyant_density: bd,
            count,
        }
    }

    #[test]
    fn test_weighted_mean() {
        let w = weighted_mean(&[1.70, 1.72, 1.74], &[1.0, 2.0, 5.0]);
        assert_relative_eq!(w, (1.70 + 2.0 * 1.72 + 5.0 * 1.74) / 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_total_is_nan() {
        assert!(weighted_mean(&[1.70, 1.72], &[0.0, 0.0]).is_nan());
        assert!(weighted_mean(&[], &[]).is_nan());
    }

    #[test]
    fn test_undefined_counts_excluded() {
        let w = weighted_mean(&[1.70, 1.72, 1.74], &[1.0, f64::NAN, 1.0]);
        assert_relative_eq!(w, 1.72, epsilon = 1e-12);
    }

    #[test]
    fn test_grouping() {
        let table = FractionTable {
            records: vec![
                record("OTU.1", true, "1", 1.70, 3.0),
                record("OTU.1", true, "1", 1.72, 1.0),
                record("OTU.1", true, "2", 1.70, 0.0),
                record("OTU.1", false, "3", 1.74, 2.0),
                record("OTU.2", false, "3", 1.74, 2.0),
            ],
            replicate_column: Some("Replicate".to_string()),
        };
        let w = weighted_densities(&table);

        assert_eq!(w.len(), 4);
        // treatment sorts before control
        assert_eq!(w.rows[0].taxon_id, "OTU.1");
        assert!(!w.rows[0].is_control);
        assert_relative_eq!(w.rows[0].w, 1.74);

        assert_eq!(w.rows[1].replicate.as_deref(), Some("1"));
        assert_relative_eq!(w.rows[1].w, (3.0 * 1.70 + 1.72) / 4.0, epsilon = 1e-12);
        assert!(w.rows[2].w.is_nan());
        assert_eq!(w.rows[3].taxon_id, "OTU.2");
    }
}
