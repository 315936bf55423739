//! YAML analysis configuration.

use super::runner::PipelineStep;
use crate::data::{AbundanceTable, CountMatrix, Metadata};
use crate::error::{Result, SipError};
use crate::qsip::{BootstrapConfig, Isotope};
use crate::shift::DeltaBdConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the abundance table comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum InputConfig {
    /// Long-format TSV with `taxon_id`, `sample_id`, `count`,
    /// `buoyant_density` and metadata columns.
    Long { path: PathBuf },
    /// Wide count matrix (taxa x samples) plus a sample metadata TSV.
    Matrix {
        counts: PathBuf,
        metadata: PathBuf,
        density_column: String,
    },
}

impl InputConfig {
    /// Load the abundance table.
    pub fn load(&self) -> Result<AbundanceTable> {
        match self {
            InputConfig::Long { path } => AbundanceTable::from_tsv(path),
            InputConfig::Matrix {
                counts,
                metadata,
                density_column,
            } => {
                let counts = CountMatrix::from_tsv(counts)?;
                let metadata = Metadata::from_tsv(metadata)?;
                AbundanceTable::from_count_matrix(&counts, metadata, density_column)
            }
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving the result tables.
    pub dir: PathBuf,
    /// Also write the per-replicate weighted density table.
    pub write_w_table: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("sip_output"),
            write_w_table: true,
        }
    }
}

/// Complete analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SipConfig {
    /// Name of the analysis.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Control expression; samples for which it holds are unlabeled controls.
    pub control: String,
    /// Metadata column naming the gradient replicate.
    #[serde(default)]
    pub replicate_column: Option<String>,
    /// Labeling isotope.
    #[serde(default)]
    pub isotope: Isotope,
    /// Input files; may be given on the command line instead.
    #[serde(default)]
    pub input: Option<InputConfig>,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl Default for SipConfig {
    fn default() -> Self {
        Self {
            name: "qsip".to_string(),
            description: None,
            control: "substrate == '12C-Con'".to_string(),
            replicate_column: Some("Replicate".to_string()),
            isotope: Isotope::C13,
            input: None,
            output: OutputConfig::default(),
            steps: vec![
                PipelineStep::DeltaBd(DeltaBdConfig::default()),
                PipelineStep::AtomExcess,
                PipelineStep::Bootstrap(BootstrapConfig::default()),
            ],
        }
    }
}

impl SipConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(SipError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(SipError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}
