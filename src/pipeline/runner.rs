//! Pipeline runner for composing and executing analysis steps.

use super::config::{OutputConfig, SipConfig};
use crate::data::{
    AbundanceTable, AtomExcess, BootstrapResults, ControlExpr, DeltaBdResultSet,
};
use crate::error::{Result, SipError};
use crate::normalize::{qpcr_rescale, read_qpcr_tsv};
use crate::qsip::{qsip_atom_excess, qsip_bootstrap, BootstrapConfig, Isotope};
use crate::shift::{delta_bd, DeltaBdConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A step in the analysis pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineStep {
    /// Rescale counts to gene copies with per-sample qPCR values from a TSV file.
    RescaleQpcr { file: PathBuf },
    /// Center-of-mass density shift per taxon.
    DeltaBd(DeltaBdConfig),
    /// Weighted densities and atom fraction excess per taxon.
    AtomExcess,
    /// Bootstrap confidence intervals; needs a preceding `AtomExcess` step.
    Bootstrap(BootstrapConfig),
}

/// Results produced by a pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineOutput {
    pub name: String,
    pub delta_bd: Option<DeltaBdResultSet>,
    pub atom_excess: Option<AtomExcess>,
    pub bootstrap: Option<BootstrapResults>,
}

impl PipelineOutput {
    /// Write every available result table as TSV into `output.dir`.
    ///
    /// Returns the paths written.
    pub fn write_tsv(&self, output: &OutputConfig) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&output.dir)?;
        let path = |stem: &str| output.dir.join(format!("{}_{}.tsv", self.name, stem));

        let mut written = Vec::new();
        if let Some(shifts) = &self.delta_bd {
            let p = path("delta_bd");
            shifts.to_tsv(&p)?;
            written.push(p);
        }
        if let Some(atom_x) = &self.atom_excess {
            if output.write_w_table {
                let p = path("w");
                atom_x.w.to_tsv(&p)?;
                written.push(p);
            }
            let p = path("atom_excess");
            atom_x.to_tsv(&p)?;
            written.push(p);
        }
        if let Some(boot) = &self.bootstrap {
            let p = path("bootstrap");
            boot.to_tsv(&p)?;
            written.push(p);
        }
        for p in &written {
            log::info!("Wrote {}", p.display());
        }
        Ok(written)
    }
}

/// Builder for constructing and running analysis pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    control: ControlExpr,
    replicate_column: Option<String>,
    isotope: Isotope,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    /// Create an empty pipeline with the given control classification.
    pub fn new(control: ControlExpr) -> Self {
        Self {
            name: "unnamed".to_string(),
            control,
            replicate_column: None,
            isotope: Isotope::C13,
            steps: Vec::new(),
        }
    }

    /// Create from a config, parsing its control expression.
    pub fn from_config(config: &SipConfig) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            control: ControlExpr::parse(&config.control)?,
            replicate_column: config.replicate_column.clone(),
            isotope: config.isotope,
            steps: config.steps.clone(),
        })
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the gradient replicate column.
    pub fn replicate_column(mut self, column: &str) -> Self {
        self.replicate_column = Some(column.to_string());
        self
    }

    /// Set the labeling isotope.
    pub fn isotope(mut self, isotope: Isotope) -> Self {
        self.isotope = isotope;
        self
    }

    /// Rescale counts by qPCR copy numbers read from `file`.
    pub fn rescale_qpcr<P: AsRef<Path>>(mut self, file: P) -> Self {
        self.steps.push(PipelineStep::RescaleQpcr {
            file: file.as_ref().to_path_buf(),
        });
        self
    }

    /// Add a delta-BD step.
    pub fn delta_bd(mut self, config: DeltaBdConfig) -> Self {
        self.steps.push(PipelineStep::DeltaBd(config));
        self
    }

    /// Add an atom fraction excess step.
    pub fn atom_excess(mut self) -> Self {
        self.steps.push(PipelineStep::AtomExcess);
        self
    }

    /// Add a bootstrap step.
    pub fn bootstrap(mut self, config: BootstrapConfig) -> Self {
        self.steps.push(PipelineStep::Bootstrap(config));
        self
    }

    /// Get the steps in this pipeline.
    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> SipConfig {
        SipConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            control: self.control.to_string(),
            replicate_column: self.replicate_column.clone(),
            isotope: self.isotope,
            input: None,
            output: OutputConfig::default(),
            steps: self.steps.clone(),
        }
    }

    /// Run the pipeline on an abundance table.
    pub fn run(&self, table: &AbundanceTable) -> Result<PipelineOutput> {
        let mut state = PipelineState {
            table: table.clone(),
            output: PipelineOutput {
                name: self.name.clone(),
                ..Default::default()
            },
        };

        for (i, step) in self.steps.iter().enumerate() {
            log::debug!("Step {}: {:?}", i + 1, step);
            state = self.apply(state, step).map_err(|e| {
                SipError::Pipeline(format!("Step {} ({:?}) failed: {}", i + 1, step, e))
            })?;
        }

        Ok(state.output)
    }

    fn apply(&self, mut state: PipelineState, step: &PipelineStep) -> Result<PipelineState> {
        match step {
            PipelineStep::RescaleQpcr { file } => {
                let copies = read_qpcr_tsv(file)?;
                state.table = qpcr_rescale(&state.table, &copies)?;
            }
            PipelineStep::DeltaBd(config) => {
                state.output.delta_bd = Some(delta_bd(&state.table, &self.control, config)?);
            }
            PipelineStep::AtomExcess => {
                state.output.atom_excess = Some(qsip_atom_excess(
                    &state.table,
                    &self.control,
                    self.replicate_column.as_deref(),
                    self.isotope,
                )?);
            }
            PipelineStep::Bootstrap(config) => {
                let atom_x = state.output.atom_excess.as_ref().ok_or_else(|| {
                    SipError::Pipeline("Must compute atom excess before bootstrapping".to_string())
                })?;
                state.output.bootstrap = Some(qsip_bootstrap(atom_x, self.isotope, config)?);
            }
        }
        Ok(state)
    }
}

/// Internal state during pipeline execution.
struct PipelineState {
    table: AbundanceTable,
    output: PipelineOutput,
}
