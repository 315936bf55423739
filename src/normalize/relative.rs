//! Relative abundance (total sum scaling) within each fraction sample.
//!
//! Each count is divided by the total count of its sample, so every fraction
//! sums to one across taxa. This removes sequencing depth differences between
//! fractions before density profiles are compared.

use crate::data::{FractionRecord, FractionTable};
use rayon::prelude::*;
use std::collections::HashMap;

/// Total count per sample, ignoring undefined counts.
pub fn sample_totals(table: &FractionTable) -> HashMap<&str, f64> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for r in table.iter() {
        let total = totals.entry(r.sample_id.as_str()).or_insert(0.0);
        if !r.count.is_nan() {
            *total += r.count;
        }
    }
    totals
}

/// Convert counts to relative abundances within each sample.
///
/// # Formula
/// For taxon i in sample j: `rel_ij = count_ij / sum_k(count_kj)`
///
/// Samples with a zero total get zero abundances rather than NaN. Undefined
/// counts stay undefined.
pub fn relative_abundance(table: &FractionTable) -> FractionTable {
    let totals = sample_totals(table);

    let records: Vec<FractionRecord> = table
        .records
        .par_iter()
        .map(|r| {
            let total = totals[r.sample_id.as_str()];
            let count = if r.count.is_nan() {
                f64::NAN
            } else if total > 0.0 {
                r.count / total
            } else {
                0.0
            };
            FractionRecord {
                count,
                ..r.clone()
            }
        })
        .collect();

    FractionTable {
        records,
        replicate_column: table.replicate_column.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(taxon: &str, sample: &str, count: f64) -> FractionRecord {
        FractionRecord {
            taxon_id: taxon.to_string(),
            sample_id: sample.to_string(),
            replicate: None,
            is_control: true,
            buoyant_density: 1.7,
            count,
        }
    }

    #[test]
    fn test_relative_abundance_sums_to_one() {
        let table = FractionTable {
            records: vec![
                record("a", "F1", 30.0),
                record("b", "F1", 10.0),
                record("a", "F2", 1.0),
                record("b", "F2", 3.0),
            ],
            replicate_column: None,
        };
        let rel = relative_abundance(&table);

        assert_relative_eq!(rel.records[0].count, 0.75);
        assert_relative_eq!(rel.records[1].count, 0.25);
        assert_relative_eq!(rel.records[2].count, 0.25);
        assert_relative_eq!(rel.records[3].count, 0.75);
    }

    #[test]
    fn test_zero_total_gives_zero() {
        let table = FractionTable {
            records: vec![record("a", "F1", 0.0), record("b", "F1", 0.0)],
            replicate_column: None,
        };
        let rel = relative_abundance(&table);
        assert!(rel.records.iter().all(|r| r.count == 0.0));
    }

    #[test]
    fn test_undefined_counts_ignored_in_total() {
        let table = FractionTable {
            records: vec![record("a", "F1", f64::NAN), record("b", "F1", 4.0)],
            replicate_column: None,
        };
        let totals = sample_totals(&table);
        assert_eq!(totals["F1"], 4.0);

        let rel = relative_abundance(&table);
        assert!(rel.records[0].count.is_nan());
        assert_relative_eq!(rel.records[1].count, 1.0);
    }
}
