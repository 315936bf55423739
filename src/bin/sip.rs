//! SIP - Stable Isotope Probing CLI
//!
//! Command-line interface for delta-BD and q-SIP analyses of fractionated
//! density gradient sequencing data.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use sipkit::data::{AbundanceTable, ControlExpr};
use sipkit::error::{Result, SipError};
use sipkit::normalize::{qpcr_rescale, read_qpcr_tsv};
use sipkit::pipeline::{InputConfig, Pipeline, SipConfig};
use sipkit::qsip::{qsip_atom_excess, qsip_bootstrap, BootstrapConfig, Isotope};
use sipkit::shift::{delta_bd, DeltaBdConfig};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Stable isotope probing analysis
#[derive(Debug, Parser)]
#[command(name = "sip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress log output.
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbosity of log output.
    ///
    /// Flag can be set multiple times to increase verbosity.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

/// Output format of result tables.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Tsv,
    Json,
}

/// Abundance table input, either long format or count matrix plus metadata.
#[derive(Debug, Args)]
struct InputArgs {
    /// Long-format TSV (taxon_id, sample_id, count, buoyant_density, metadata...)
    #[arg(short = 't', long, conflicts_with_all = ["counts", "metadata"])]
    table: Option<PathBuf>,

    /// Count matrix TSV (taxa x samples)
    #[arg(short = 'c', long, requires = "metadata")]
    counts: Option<PathBuf>,

    /// Sample metadata TSV
    #[arg(short, long, requires = "counts")]
    metadata: Option<PathBuf>,

    /// Metadata column holding the buoyant density of each fraction
    #[arg(long, default_value = "Buoyant_density")]
    density_column: String,

    /// Two-column TSV of qPCR copies per sample; counts are rescaled to copies
    #[arg(long)]
    qpcr: Option<PathBuf>,
}

impl InputArgs {
    fn to_config(&self) -> Option<InputConfig> {
        match (&self.table, &self.counts, &self.metadata) {
            (Some(path), _, _) => Some(InputConfig::Long { path: path.clone() }),
            (None, Some(counts), Some(metadata)) => Some(InputConfig::Matrix {
                counts: counts.clone(),
                metadata: metadata.clone(),
                density_column: self.density_column.clone(),
            }),
            _ => None,
        }
    }

    fn load(&self) -> Result<AbundanceTable> {
        let input = self.to_config().ok_or_else(|| {
            SipError::InvalidParameter(
                "Provide either --table or --counts with --metadata".to_string(),
            )
        })?;
        let table = load_table(&input)?;
        match &self.qpcr {
            Some(path) => {
                log::info!("Rescaling counts with qPCR values from {}", path.display());
                qpcr_rescale(&table, &read_qpcr_tsv(path)?)
            }
            None => Ok(table),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Center-of-mass buoyant density shift per taxon
    DeltaBd {
        #[command(flatten)]
        input: InputArgs,

        /// Control expression, e.g. "substrate == '12C-Con'"
        #[arg(long)]
        control: String,

        /// Number of interpolation grid points
        #[arg(short, long, default_value = "20")]
        n: usize,

        /// Lower bound of the density grid
        #[arg(long)]
        bd_min: Option<f64>,

        /// Upper bound of the density grid
        #[arg(long)]
        bd_max: Option<f64>,

        /// Output path; JSON is printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "tsv")]
        format: Format,
    },

    /// Atom fraction excess per taxon, optionally with bootstrap intervals
    AtomExcess {
        #[command(flatten)]
        input: InputArgs,

        /// Control expression, e.g. "substrate == '12C-Con'"
        #[arg(long)]
        control: String,

        /// Metadata column naming the gradient replicate
        #[arg(short, long)]
        replicate: Option<String>,

        /// Labeling isotope (13C or 18O)
        #[arg(short, long, default_value = "13C")]
        isotope: String,

        /// Compute bootstrap confidence intervals
        #[arg(long)]
        bootstrap: bool,

        /// Number of bootstrap replicates
        #[arg(long, default_value = "1000")]
        n_boot: usize,

        /// Control W values drawn per bootstrap replicate
        #[arg(long, default_value = "3")]
        n_light: usize,

        /// Labeled W values drawn per bootstrap replicate
        #[arg(long, default_value = "3")]
        n_lab: usize,

        /// Two-sided significance level of the intervals
        #[arg(long, default_value = "0.1")]
        alpha: f64,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Run bootstrap replicates in parallel
        #[arg(long)]
        parallel: bool,

        /// Also write the weighted density table to this path
        #[arg(long)]
        w_output: Option<PathBuf>,

        /// Output path; JSON is printed to stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "tsv")]
        format: Format,
    },

    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(long)]
        config: PathBuf,

        /// Input files, overriding the configuration
        #[command(flatten)]
        input: InputArgs,

        /// Output directory, overriding the configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write an example pipeline configuration
    ExampleConfig {
        /// Output path for the YAML file
        #[arg(short, long, default_value = "sip_pipeline.yaml")]
        output: PathBuf,
    },
}

fn init_logger(quiet: bool, verbose: u8) {
    let level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    match env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Stderr)
        .format(|buf, record| {
            let level = record.level().as_str().to_lowercase();
            let args = record.args();
            writeln!(buf, "[sip {level:>5}] {args}")
        })
        .try_init()
    {
        Ok(()) => (),
        Err(e) => eprintln!("failed to setup logger: {e}"),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::DeltaBd {
            input,
            control,
            n,
            bd_min,
            bd_max,
            output,
            format,
        } => {
            let config = DeltaBdConfig {
                n,
                bd_min,
                bd_max,
                ..Default::default()
            };
            cmd_delta_bd(&input, &control, &config, output.as_deref(), format)
        }

        Commands::AtomExcess {
            input,
            control,
            replicate,
            isotope,
            bootstrap,
            n_boot,
            n_light,
            n_lab,
            alpha,
            seed,
            parallel,
            w_output,
            output,
            format,
        } => {
            let boot = bootstrap.then(|| BootstrapConfig {
                n_sample: (n_light, n_lab),
                n_boot,
                a: alpha,
                seed,
                parallel,
            });
            cmd_atom_excess(
                &input,
                &control,
                replicate.as_deref(),
                &isotope,
                boot.as_ref(),
                w_output.as_deref(),
                output.as_deref(),
                format,
            )
        }

        Commands::Run {
            config,
            input,
            output,
        } => cmd_run(&config, &input, output),

        Commands::ExampleConfig { output } => cmd_example_config(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_table(input: &InputConfig) -> Result<AbundanceTable> {
    let table = input.load()?;
    log::info!(
        "Loaded {} rows across {} samples",
        table.len(),
        table.metadata().n_samples()
    );
    Ok(table)
}

/// Write a serializable result as pretty JSON to `path`, or stdout.
fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(std::io::BufWriter::new(file), value)?;
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

fn require_output(output: Option<&Path>) -> Result<&Path> {
    output.ok_or_else(|| {
        SipError::InvalidParameter("TSV output needs an --output path".to_string())
    })
}

/// Compute delta BD
fn cmd_delta_bd(
    input: &InputArgs,
    control: &str,
    config: &DeltaBdConfig,
    output: Option<&Path>,
    format: Format,
) -> Result<()> {
    let table = input.load()?;
    let expr = ControlExpr::parse(control)?;
    let results = delta_bd(&table, &expr, config)?;

    let shifted = results.results.iter().filter(|r| r.delta_bd > 0.0).count();
    log::info!(
        "{} of {} taxa shifted to heavier densities",
        shifted,
        results.len()
    );

    match (format, output) {
        (Format::Tsv, output) => results.to_tsv(require_output(output)?),
        (Format::Json, output) => write_json(&results, output),
    }
}

/// Compute atom fraction excess, optionally with bootstrap intervals
#[allow(clippy::too_many_arguments)]
fn cmd_atom_excess(
    input: &InputArgs,
    control: &str,
    replicate: Option<&str>,
    isotope: &str,
    bootstrap: Option<&BootstrapConfig>,
    w_output: Option<&Path>,
    output: Option<&Path>,
    format: Format,
) -> Result<()> {
    let isotope: Isotope = isotope.parse()?;
    let table = input.load()?;
    let expr = ControlExpr::parse(control)?;
    let atom_x = qsip_atom_excess(&table, &expr, replicate, isotope)?;

    if let Some(path) = w_output {
        atom_x.w.to_tsv(path)?;
    }

    match bootstrap {
        Some(config) => {
            let boot = qsip_bootstrap(&atom_x, isotope, config)?;
            log::info!(
                "{} of {} taxa have intervals above zero",
                boot.incorporators().len(),
                boot.len()
            );
            match format {
                Format::Tsv => boot.to_tsv(require_output(output)?),
                Format::Json => write_json(&boot, output),
            }
        }
        None => match format {
            Format::Tsv => atom_x.to_tsv(require_output(output)?),
            Format::Json => write_json(&atom_x, output),
        },
    }
}

/// Run a pipeline from configuration
fn cmd_run(config_path: &Path, input: &InputArgs, output: Option<PathBuf>) -> Result<()> {
    log::info!("Loading pipeline configuration from {}", config_path.display());
    let mut config = SipConfig::from_file(config_path)?;
    if let Some(dir) = output {
        config.output.dir = dir;
    }

    let table = match input.to_config().or_else(|| config.input.clone()) {
        Some(source) => load_table(&source)?,
        None => {
            return Err(SipError::InvalidParameter(
                "No input given on the command line or in the configuration".to_string(),
            ))
        }
    };
    let table = match &input.qpcr {
        Some(path) => qpcr_rescale(&table, &read_qpcr_tsv(path)?)?,
        None => table,
    };

    log::info!("Running pipeline '{}'", config.name);
    let results = Pipeline::from_config(&config)?.run(&table)?;
    let written = results.write_tsv(&config.output)?;
    log::info!("Done, {} result tables written", written.len());
    Ok(())
}

/// Write example pipeline configuration
fn cmd_example_config(output: &Path) -> Result<()> {
    let config = SipConfig {
        description: Some("Delta BD and q-SIP atom excess with bootstrap intervals".to_string()),
        input: Some(InputConfig::Matrix {
            counts: PathBuf::from("counts.tsv"),
            metadata: PathBuf::from("samples.tsv"),
            density_column: "Buoyant_density".to_string(),
        }),
        ..Default::default()
    };
    std::fs::write(output, config.to_yaml()?)?;
    eprintln!("Example configuration written to {}", output.display());
    Ok(())
}
