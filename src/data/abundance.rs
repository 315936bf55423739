//! Long-format abundance table: one row per (taxon, fraction) pair.
//!
//! This is the input contract of the core. Counts and densities are kept as
//! raw [`Variable`]s so textual numbers from upstream tools survive until the
//! table formatter casts them.

use crate::data::{CountMatrix, Metadata, Variable, VariableType};
use crate::error::{Result, SipError};
use std::collections::HashMap;
use std::path::Path;

/// Column holding the taxon identifier in long-format files.
pub const TAXON_COLUMN: &str = "taxon_id";
/// Column holding the fraction sample identifier in long-format files.
pub const SAMPLE_COLUMN: &str = "sample_id";
/// Column holding the raw count in long-format files.
pub const COUNT_COLUMN: &str = "count";
/// Column holding the buoyant density in long-format files.
pub const DENSITY_COLUMN: &str = "buoyant_density";

/// A single unformatted (taxon, fraction) observation.
#[derive(Debug, Clone, PartialEq)]
pub struct AbundanceRow {
    pub taxon_id: String,
    pub sample_id: String,
    pub count: Variable,
    pub buoyant_density: Variable,
}

/// Long-format abundance table plus the metadata of every sample it references.
#[derive(Debug, Clone)]
pub struct AbundanceTable {
    rows: Vec<AbundanceRow>,
    metadata: Metadata,
}

impl AbundanceTable {
    /// Create a table, checking that every row's sample has metadata.
    pub fn new(rows: Vec<AbundanceRow>, metadata: Metadata) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| !metadata.has_sample(&r.sample_id)) {
            return Err(SipError::SampleMismatch(format!(
                "Sample '{}' has no metadata",
                row.sample_id
            )));
        }
        Ok(Self { rows, metadata })
    }

    /// Load a long-format TSV file.
    ///
    /// Required columns are `taxon_id`, `sample_id`, `count` and
    /// `buoyant_density`. Every other column is treated as sample metadata;
    /// the first row seen for a sample defines its metadata values.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| SipError::MissingColumn(name.to_string()))
        };
        let taxon_idx = position(TAXON_COLUMN)?;
        let sample_idx = position(SAMPLE_COLUMN)?;
        let count_idx = position(COUNT_COLUMN)?;
        let density_idx = position(DENSITY_COLUMN)?;

        let meta_indices: Vec<usize> = (0..headers.len())
            .filter(|i| ![taxon_idx, sample_idx, count_idx, density_idx].contains(i))
            .collect();
        let meta_columns: Vec<String> = meta_indices
            .iter()
            .map(|&i| headers[i].to_string())
            .collect();

        let mut rows = Vec::new();
        let mut raw_metadata: Vec<(String, Vec<String>)> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();

        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or("");
            let sample_id = field(sample_idx).to_string();

            if !seen.contains_key(&sample_id) {
                seen.insert(sample_id.clone(), raw_metadata.len());
                let values = meta_indices.iter().map(|&i| field(i).to_string()).collect();
                raw_metadata.push((sample_id.clone(), values));
            }

            rows.push(AbundanceRow {
                taxon_id: field(taxon_idx).to_string(),
                sample_id,
                count: Variable::parse(field(count_idx), VariableType::Categorical),
                buoyant_density: Variable::parse(field(density_idx), VariableType::Categorical),
            });
        }

        if rows.is_empty() {
            return Err(SipError::EmptyData("No rows in abundance table".to_string()));
        }

        let metadata = Metadata::from_raw(meta_columns, raw_metadata)?;
        log::debug!(
            "Loaded {} abundance rows across {} samples",
            rows.len(),
            metadata.n_samples()
        );
        Self::new(rows, metadata)
    }

    /// Melt a wide count matrix into long format.
    ///
    /// Every (taxon, sample) cell becomes a row, zeros included, since zero
    /// observations shape the density profiles. Buoyant density is read from
    /// `density_column` of the sample metadata.
    pub fn from_count_matrix(
        counts: &CountMatrix,
        metadata: Metadata,
        density_column: &str,
    ) -> Result<Self> {
        if !metadata.has_column(density_column) {
            return Err(SipError::MissingColumn(density_column.to_string()));
        }

        let mut rows = Vec::with_capacity(counts.n_taxa() * counts.n_samples());
        for (col, sample_id) in counts.sample_ids().iter().enumerate() {
            let density = metadata
                .get(sample_id, density_column)
                .cloned()
                .ok_or_else(|| {
                    SipError::SampleMismatch(format!("Sample '{}' has no metadata", sample_id))
                })?;
            for (row, taxon_id) in counts.taxon_ids().iter().enumerate() {
                rows.push(AbundanceRow {
                    taxon_id: taxon_id.clone(),
                    sample_id: sample_id.clone(),
                    count: Variable::Continuous(counts.get(row, col) as f64),
                    buoyant_density: density.clone(),
                });
            }
        }

        Self::new(rows, metadata)
    }

    /// Rows of the table.
    pub fn rows(&self) -> &[AbundanceRow] {
        &self.rows
    }

    /// Sample metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Replace the counts of every row, keeping order, densities and metadata.
    pub(crate) fn with_counts(&self, counts: Vec<f64>) -> Self {
        let rows = self
            .rows
            .iter()
            .zip(counts)
            .map(|(row, count)| AbundanceRow {
                count: Variable::Continuous(count),
                ..row.clone()
            })
            .collect();
        Self {
            rows,
            metadata: self.metadata.clone(),
        }
    }
}
