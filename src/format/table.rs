//! Format a raw abundance table into fraction records.

use crate::data::{AbundanceTable, ControlPredicate, FractionRecord, FractionTable};
use crate::error::{Result, SipError};
use std::collections::HashMap;

/// Format a long-format abundance table.
///
/// The control predicate is evaluated once per sample. Counts and densities
/// are cast to `f64` (unparseable text becomes NaN) and rows whose density is
/// NaN or infinite are dropped.
///
/// # Arguments
/// * `table` - Raw abundance table
/// * `predicate` - Classifies a sample as control (`true`) or treatment
/// * `replicate_column` - Optional metadata column holding the gradient replicate
///
/// # Errors
/// Fails when the replicate column does not exist, when the predicate cannot
/// be evaluated for a sample, and when no rows survive formatting.
pub fn format_table<P>(
    table: &AbundanceTable,
    predicate: &P,
    replicate_column: Option<&str>,
) -> Result<FractionTable>
where
    P: ControlPredicate + ?Sized,
{
    let metadata = table.metadata();
    if let Some(column) = replicate_column {
        if !metadata.has_column(column) {
            return Err(SipError::MissingColumn(column.to_string()));
        }
    }

    // sample_id -> (is_control, replicate)
    let mut samples: HashMap<&str, (bool, Option<String>)> = HashMap::new();
    for row in table.rows() {
        if samples.contains_key(row.sample_id.as_str()) {
            continue;
        }
        let view = metadata.sample(&row.sample_id).ok_or_else(|| {
            SipError::SampleMismatch(format!("Sample '{}' has no metadata", row.sample_id))
        })?;
        let is_control = predicate.is_control(&view)?;
        let replicate = replicate_column
            .and_then(|column| view.get(column))
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string());
        samples.insert(row.sample_id.as_str(), (is_control, replicate));
    }

    let records: Vec<FractionRecord> = table
        .rows()
        .iter()
        .filter_map(|row| {
            let buoyant_density = row.buoyant_density.to_f64();
            if !buoyant_density.is_finite() {
                return None;
            }
            let (is_control, replicate) = &samples[row.sample_id.as_str()];
            Some(FractionRecord {
                taxon_id: row.taxon_id.clone(),
                sample_id: row.sample_id.clone(),
                replicate: replicate.clone(),
                is_control: *is_control,
                buoyant_density,
                count: row.count.to_f64(),
            })
        })
        .collect();

    if records.is_empty() {
        return Err(SipError::EmptyData(
            "No rows left after formatting the abundance table; check the control expression \
             and the replicate column"
                .to_string(),
        ));
    }

    let n_control = samples.values().filter(|(c, _)| *c).count();
    log::debug!(
        "Formatted {} of {} rows ({} control / {} treatment samples)",
        records.len(),
        table.len(),
        n_control,
        samples.len() - n_control
    );

    Ok(FractionTable {
        records,
        replicate_column: replicate_column.map(String::from),
    })
}
