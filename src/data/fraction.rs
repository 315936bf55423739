//! Formatted fraction records: the shared input of both SIP pipelines.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One formatted (taxon, fraction) observation.
///
/// `buoyant_density` is always finite. `count` is NaN when the source value
/// could not be read as a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FractionRecord {
    pub taxon_id: String,
    pub sample_id: String,
    /// Gradient replicate group, when a replicate column was requested and set.
    pub replicate: Option<String>,
    pub is_control: bool,
    pub buoyant_density: f64,
    pub count: f64,
}

/// Long-format table of formatted fraction records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FractionTable {
    pub records: Vec<FractionRecord>,
    /// Metadata column the replicate groups came from.
    pub replicate_column: Option<String>,
}

impl FractionTable {
    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the table has no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records.
    pub fn iter(&self) -> impl Iterator<Item = &FractionRecord> {
        self.records.iter()
    }

    /// Smallest and largest buoyant density, `None` for an empty table.
    pub fn density_range(&self) -> Option<(f64, f64)> {
        self.records.iter().map(|r| r.buoyant_density).fold(None, |acc, bd| {
            Some(match acc {
                None => (bd, bd),
                Some((lo, hi)) => (lo.min(bd), hi.max(bd)),
            })
        })
    }

    /// Distinct taxon identifiers, sorted.
    pub fn taxa(&self) -> Vec<&str> {
        self.records
            .iter()
            .map(|r| r.taxon_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(
            writer,
            "taxon_id\tsample_id\treplicate\tis_control\tbuoyant_density\tcount"
        )?;
        for r in &self.records {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{}\t{}",
                r.taxon_id,
                r.sample_id,
                r.replicate.as_deref().unwrap_or("NA"),
                if r.is_control { "TRUE" } else { "FALSE" },
                r.buoyant_density,
                r.count
            )?;
        }

        Ok(())
    }
}
