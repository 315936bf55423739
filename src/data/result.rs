//! Result tables of the delta-BD and q-SIP pipelines.

use crate::error::Result;
use crate::qsip::Isotope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Format a value for TSV output; undefined values are written as `NA`.
fn tsv_value(v: f64) -> String {
    if v.is_nan() {
        "NA".to_string()
    } else {
        format!("{:.6}", v)
    }
}

/// Center-of-mass shift of a single taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaBdResult {
    pub taxon_id: String,
    /// Center of mass in control gradients (NaN if the taxon has no control rows).
    pub cm_control: f64,
    /// Center of mass in labeled gradients (NaN if the taxon has no treatment rows).
    pub cm_treatment: f64,
    /// `cm_treatment - cm_control`.
    pub delta_bd: f64,
}

/// Delta-BD results for all taxa, with the grid they were computed on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaBdResultSet {
    pub n: usize,
    pub bd_min: f64,
    pub bd_max: f64,
    pub results: Vec<DeltaBdResult>,
}

impl DeltaBdResultSet {
    /// Number of taxa.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Look up a taxon.
    pub fn get(&self, taxon_id: &str) -> Option<&DeltaBdResult> {
        self.results.iter().find(|r| r.taxon_id == taxon_id)
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "taxon_id\tCM_control\tCM_treatment\tdelta_BD")?;
        for r in &self.results {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                r.taxon_id,
                tsv_value(r.cm_control),
                tsv_value(r.cm_treatment),
                tsv_value(r.delta_bd)
            )?;
        }
        Ok(())
    }
}

/// Weighted mean buoyant density of a taxon in one gradient replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedDensity {
    pub taxon_id: String,
    pub is_control: bool,
    pub replicate: Option<String>,
    /// Count-weighted mean density; NaN when the replicate's total count is zero.
    pub w: f64,
}

/// Table of weighted mean densities, one row per (taxon, control flag, replicate).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WTable {
    pub rows: Vec<WeightedDensity>,
}

impl WTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "taxon_id\tis_control\treplicate\tW")?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                r.taxon_id,
                if r.is_control { "TRUE" } else { "FALSE" },
                r.replicate.as_deref().unwrap_or("NA"),
                tsv_value(r.w)
            )?;
        }
        Ok(())
    }
}

/// q-SIP atom fraction excess summary of a single taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomExcessRow {
    pub taxon_id: String,
    /// Mean W of unlabeled (control) gradients.
    pub wlight: f64,
    /// Mean W of labeled (treatment) gradients.
    pub wlab: f64,
    /// BD shift, `wlab - wlight`.
    pub z: f64,
    /// GC fraction.
    pub gi: f64,
    /// Molecular weight of unlabeled DNA.
    pub mlight: f64,
    /// Theoretical molecular weight of fully labeled DNA.
    pub mheavymax: f64,
    /// Molecular weight of labeled DNA.
    pub mlab: f64,
    /// Atom fraction excess.
    pub a: f64,
}

/// Output of the non-bootstrap q-SIP entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomExcess {
    pub isotope: Isotope,
    /// Per (taxon, control flag, replicate) weighted densities.
    pub w: WTable,
    /// Per-taxon summary, sorted by taxon id.
    pub a: Vec<AtomExcessRow>,
    /// GC fractions supplied by the caller; taxa not listed use the
    /// density-derived estimate.
    #[serde(default)]
    pub gc_content: BTreeMap<String, f64>,
}

const ATOM_EXCESS_HEADER: &str = "taxon_id\tWlight\tWlab\tZ\tGi\tMlight\tMheavymax\tMlab\tA";

fn atom_excess_fields(r: &AtomExcessRow) -> String {
    [r.wlight, r.wlab, r.z, r.gi, r.mlight, r.mheavymax, r.mlab, r.a]
        .iter()
        .map(|&v| tsv_value(v))
        .collect::<Vec<_>>()
        .join("\t")
}

impl AtomExcess {
    /// Look up a taxon's summary.
    pub fn get(&self, taxon_id: &str) -> Option<&AtomExcessRow> {
        self.a.iter().find(|r| r.taxon_id == taxon_id)
    }

    /// Write the per-taxon summary to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", ATOM_EXCESS_HEADER)?;
        for r in &self.a {
            writeln!(writer, "{}\t{}", r.taxon_id, atom_excess_fields(r))?;
        }
        Ok(())
    }
}

/// Atom fraction excess of a taxon with its bootstrap confidence interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapRow {
    #[serde(flatten)]
    pub summary: AtomExcessRow,
    pub a_ci_low: f64,
    pub a_ci_high: f64,
}

/// Bootstrap confidence intervals for all taxa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapResults {
    pub isotope: Isotope,
    pub n_boot: usize,
    /// Two-sided significance level; the interval covers `1 - a`.
    pub a: f64,
    pub rows: Vec<BootstrapRow>,
}

impl BootstrapResults {
    /// Number of taxa.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a taxon.
    pub fn get(&self, taxon_id: &str) -> Option<&BootstrapRow> {
        self.rows.iter().find(|r| r.summary.taxon_id == taxon_id)
    }

    /// Taxa whose interval excludes zero, i.e. that look isotopically labeled.
    pub fn incorporators(&self) -> Vec<&BootstrapRow> {
        self.rows.iter().filter(|r| r.a_ci_low > 0.0).collect()
    }

    /// Write results to TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}\tA_CI_low\tA_CI_high", ATOM_EXCESS_HEADER)?;
        for r in &self.rows {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                r.summary.taxon_id,
                atom_excess_fields(&r.summary),
                tsv_value(r.a_ci_low),
                tsv_value(r.a_ci_high)
            )?;
        }
        Ok(())
    }
}
