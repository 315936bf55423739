//! qPCR-based rescaling of sequence counts to absolute abundances.
//!
//! Sequencing only measures composition. When the total number of gene copies
//! in every fraction is known from qPCR, relative abundances can be converted
//! to copy numbers:
//!
//! ```text
//! copies_ij = count_ij / sum_k(count_kj) * qpcr_j
//! ```

use crate::data::AbundanceTable;
use crate::error::{Result, SipError};
use std::collections::HashMap;
use std::path::Path;

/// Read per-sample qPCR copy numbers from a two-column TSV file
/// (`sample_id`, copies) with a header line.
pub fn read_qpcr_tsv<P: AsRef<Path>>(path: P) -> Result<HashMap<String, f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?;

    let mut copies = HashMap::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let sample_id = record.get(0).unwrap_or("").trim();
        let raw = record.get(1).unwrap_or("").trim();
        let value: f64 = raw.parse().map_err(|_| SipError::InvalidCount {
            value: raw.to_string(),
            row: row + 1,
            col: 2,
        })?;
        copies.insert(sample_id.to_string(), value);
    }

    if copies.is_empty() {
        return Err(SipError::EmptyData("No qPCR values".to_string()));
    }
    Ok(copies)
}

/// Rescale the counts of an abundance table by per-sample qPCR copy numbers.
///
/// # Arguments
/// * `table` - Raw abundance table
/// * `copies` - Gene copies per sample, keyed by sample ID
///
/// # Errors
/// Every sample in the table needs a finite, non-negative qPCR value.
pub fn qpcr_rescale(table: &AbundanceTable, copies: &HashMap<String, f64>) -> Result<AbundanceTable> {
    let counts: Vec<f64> = table.rows().iter().map(|r| r.count.to_f64()).collect();

    let mut totals: HashMap<&str, f64> = HashMap::new();
    for (row, &count) in table.rows().iter().zip(&counts) {
        let total = totals.entry(row.sample_id.as_str()).or_insert(0.0);
        if !count.is_nan() {
            *total += count;
        }
    }

    for sample_id in totals.keys() {
        match copies.get(*sample_id) {
            Some(&q) if q.is_finite() && q >= 0.0 => {}
            Some(&q) => {
                return Err(SipError::InvalidParameter(format!(
                    "qPCR value {} for sample '{}' must be finite and non-negative",
                    q, sample_id
                )))
            }
            None => {
                return Err(SipError::SampleMismatch(format!(
                    "Sample '{}' has no qPCR value",
                    sample_id
                )))
            }
        }
    }

    let rescaled: Vec<f64> = table
        .rows()
        .iter()
        .zip(&counts)
        .map(|(row, &count)| {
            let total = totals[row.sample_id.as_str()];
            if count.is_nan() {
                f64::NAN
            } else if total > 0.0 {
                count / total * copies[&row.sample_id]
            } else {
                0.0
            }
        })
        .collect();

    log::debug!("Rescaled {} samples by qPCR copy numbers", totals.len());
    Ok(table.with_counts(rescaled))
}
