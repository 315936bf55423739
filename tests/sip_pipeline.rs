//! Integration tests for the delta-BD and q-SIP pipelines.

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sipkit::prelude::*;
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

const N_FRACTIONS: usize = 12;
const N_GRADIENTS: usize = 4;
const LABEL_SHIFT: f64 = 0.015;

/// Peak density of each taxon in unlabeled gradients, and whether it
/// incorporates the label.
const TAXA: [(&str, f64, bool); 6] = [
    ("labeled_1", 1.700, true),
    ("labeled_2", 1.710, true),
    ("labeled_3", 1.720, true),
    ("unlabeled_1", 1.700, false),
    ("unlabeled_2", 1.710, false),
    ("unlabeled_3", 1.720, false),
];

struct Fraction {
    sample_id: String,
    substrate: &'static str,
    replicate: usize,
    density: f64,
}

/// Four control and four labeled gradients of twelve fractions each. Fraction
/// densities are offset by 0.001 g/ml per gradient replicate, identically in
/// control and labeled gradients.
fn create_fractions() -> Vec<Fraction> {
    let mut fractions = Vec::new();
    for (substrate, rep_offset) in [("12C-Con", 0), ("13C-Cel", N_GRADIENTS)] {
        for g in 0..N_GRADIENTS {
            for f in 0..N_FRACTIONS {
                let density = 1.670 + 0.01 * f as f64 + 0.001 * g as f64;
                fractions.push(Fraction {
                    sample_id: format!("{}_G{}_F{:02}", substrate, g + 1, f + 1),
                    substrate,
                    replicate: rep_offset + g + 1,
                    density: (density * 1000.0).round() / 1000.0,
                });
            }
        }
    }
    fractions
}

/// Gaussian density profile plus a flat background taxon dominating every fraction.
fn count(taxon: &str, peak: f64, incorporates: bool, fraction: &Fraction) -> u64 {
    if taxon == "background" {
        return 20_000;
    }
    let labeled = fraction.substrate.starts_with("13C");
    let center = if labeled && incorporates { peak + LABEL_SHIFT } else { peak };
    let z = (fraction.density - center) / 0.01;
    (1000.0 * (-0.5 * z * z).exp()).round() as u64
}

fn all_taxa() -> Vec<(&'static str, f64, bool)> {
    let mut taxa = TAXA.to_vec();
    taxa.push(("background", 0.0, false));
    taxa
}

fn create_table() -> AbundanceTable {
    let fractions = create_fractions();
    let mut rows = Vec::new();
    let mut raw_metadata = Vec::new();
    for fraction in &fractions {
        raw_metadata.push((
            fraction.sample_id.clone(),
            vec![fraction.substrate.to_string(), fraction.replicate.to_string()],
        ));
        for (taxon, peak, incorporates) in all_taxa() {
            rows.push(AbundanceRow {
                taxon_id: taxon.to_string(),
                sample_id: fraction.sample_id.clone(),
                count: Variable::Continuous(count(taxon, peak, incorporates, fraction) as f64),
                buoyant_density: Variable::Continuous(fraction.density),
            });
        }
    }
    let metadata = Metadata::from_raw(
        vec!["substrate".to_string(), "Replicate".to_string()],
        raw_metadata,
    )
    .unwrap();
    AbundanceTable::new(rows, metadata).unwrap()
}

fn write_long_tsv(path: &Path) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "taxon_id\tsample_id\tcount\tbuoyant_density\tsubstrate\tReplicate").unwrap();
    for fraction in create_fractions() {
        for (taxon, peak, incorporates) in all_taxa() {
            writeln!(
                file,
                "{}\t{}\t{}\t{:.3}\t{}\t{}",
                taxon,
                fraction.sample_id,
                count(taxon, peak, incorporates, &fraction),
                fraction.density,
                fraction.substrate,
                fraction.replicate
            )
            .unwrap();
        }
    }
}

fn write_matrix_tsv(counts_path: &Path, metadata_path: &Path) {
    let fractions = create_fractions();

    let mut counts = std::fs::File::create(counts_path).unwrap();
    let header: Vec<&str> = fractions.iter().map(|f| f.sample_id.as_str()).collect();
    writeln!(counts, "taxon\t{}", header.join("\t")).unwrap();
    for (taxon, peak, incorporates) in all_taxa() {
        let values: Vec<String> = fractions
            .iter()
            .map(|f| count(taxon, peak, incorporates, f).to_string())
            .collect();
        writeln!(counts, "{}\t{}", taxon, values.join("\t")).unwrap();
    }

    let mut metadata = std::fs::File::create(metadata_path).unwrap();
    writeln!(metadata, "sample\tsubstrate\tReplicate\tBuoyant_density").unwrap();
    for f in &fractions {
        writeln!(
            metadata,
            "{}\t{}\t{}\t{:.3}",
            f.sample_id, f.substrate, f.replicate, f.density
        )
        .unwrap();
    }
}

fn control() -> ControlExpr {
    ControlExpr::parse("substrate == '12C-Con'").unwrap()
}

#[test]
fn test_delta_bd_detects_labeled_taxa() {
    let table = create_table();
    let results = delta_bd(&table, &control(), &DeltaBdConfig::default()).unwrap();

    assert_eq!(results.len(), 7);
    for (taxon, _, incorporates) in TAXA {
        let r = results.get(taxon).unwrap();
        if incorporates {
            assert!(r.delta_bd > 0.01, "{} shift {}", taxon, r.delta_bd);
        } else {
            assert!(r.delta_bd.abs() < 0.005, "{} shift {}", taxon, r.delta_bd);
        }
    }
}

#[test]
fn test_delta_bd_swap_negates_shift() {
    let table = create_table();
    let config = DeltaBdConfig::default();
    let forward = delta_bd(&table, &control(), &config).unwrap();
    let swapped = delta_bd(&table, &control().negate(), &config).unwrap();

    assert_eq!(forward.bd_min, swapped.bd_min);
    assert_eq!(forward.bd_max, swapped.bd_max);
    for (a, b) in forward.results.iter().zip(&swapped.results) {
        assert_eq!(a.taxon_id, b.taxon_id);
        assert_relative_eq!(a.delta_bd, -b.delta_bd, epsilon = 1e-12);
        assert_relative_eq!(a.cm_control, b.cm_treatment, epsilon = 1e-12);
    }
}

#[test]
fn test_closure_predicate_matches_expression() {
    let table = create_table();
    let closure = |s: &SampleView<'_>| {
        s.get("substrate")
            .and_then(|v| v.as_categorical())
            .map_or(false, |v| v == "12C-Con")
    };
    let config = DeltaBdConfig::default();
    let from_closure = delta_bd(&table, &closure, &config).unwrap();
    let from_expr = delta_bd(&table, &control(), &config).unwrap();
    assert_eq!(from_closure.results, from_expr.results);
}

#[test]
fn test_atom_excess_labeled_vs_unlabeled() {
    let table = create_table();
    let atom_x = qsip_atom_excess(&table, &control(), Some("Replicate"), Isotope::C13).unwrap();

    // 7 taxa x 8 gradients
    assert_eq!(atom_x.w.len(), 56);
    for (taxon, _, incorporates) in TAXA {
        let row = atom_x.get(taxon).unwrap();
        if incorporates {
            assert_relative_eq!(row.z, LABEL_SHIFT, epsilon = 2e-3);
            assert!(row.a > 0.2 && row.a < 0.4, "{} A {}", taxon, row.a);
        } else {
            assert_eq!(row.z, 0.0);
            assert_eq!(row.a, 0.0);
        }
    }
}

#[test]
fn test_atom_excess_idempotent() {
    let table = create_table();
    let first = qsip_atom_excess(&table, &control(), Some("Replicate"), Isotope::O18).unwrap();
    let second = qsip_atom_excess(&table, &control(), Some("Replicate"), Isotope::O18).unwrap();

    assert_eq!(first.w, second.w);
    assert_eq!(first.a, second.a);

    // Reusing the W table reproduces the summary
    assert_eq!(atom_excess_from_w(&first.w, Isotope::O18, None), first.a);
}

#[test]
fn test_unknown_isotope_is_fatal() {
    assert!(matches!(
        "14C".parse::<Isotope>(),
        Err(SipError::UnknownIsotope(_))
    ));
}

#[test]
fn test_bootstrap_flags_incorporators() {
    let table = create_table();
    let atom_x = qsip_atom_excess(&table, &control(), Some("Replicate"), Isotope::C13).unwrap();
    let config = BootstrapConfig {
        n_boot: 200,
        parallel: true,
        ..Default::default()
    };
    let boot = qsip_bootstrap(&atom_x, Isotope::C13, &config).unwrap();

    assert_eq!(boot.len(), 7);
    let mut hits: Vec<&str> = boot
        .incorporators()
        .iter()
        .map(|r| r.summary.taxon_id.as_str())
        .collect();
    hits.sort_unstable();
    assert_eq!(hits, vec!["labeled_1", "labeled_2", "labeled_3"]);
}

#[test]
fn test_bootstrap_coverage() {
    use rand::distributions::Distribution;

    let (mu_light, mu_lab, sd) = (1.700, 1.720, 0.002);
    let n_taxa = 100;
    let n_reps = 20;

    let light = Normal::new(mu_light, sd).unwrap();
    let lab = Normal::new(mu_lab, sd).unwrap();
    let mut rng = StdRng::seed_from_u64(2024);

    let mut rows = Vec::new();
    for t in 0..n_taxa {
        for r in 0..n_reps {
            for (is_control, dist) in [(true, &light), (false, &lab)] {
                rows.push(WeightedDensity {
                    taxon_id: format!("taxon_{:03}", t),
                    is_control,
                    replicate: Some(r.to_string()),
                    w: dist.sample(&mut rng),
                });
            }
        }
    }
    let w = WTable { rows };
    let a = atom_excess_from_w(&w, Isotope::C13, None);
    let atom_x = AtomExcess {
        isotope: Isotope::C13,
        w,
        a,
        gc_content: BTreeMap::new(),
    };

    let config = BootstrapConfig {
        n_sample: (n_reps, n_reps),
        n_boot: 1000,
        a: 0.1,
        seed: 7,
        parallel: true,
    };
    let boot = qsip_bootstrap(&atom_x, Isotope::C13, &config).unwrap();

    let true_a = sipkit::qsip::atom_excess_row("truth", mu_light, mu_lab, Isotope::C13, None).a;
    let covered = boot
        .rows
        .iter()
        .filter(|r| r.a_ci_low <= true_a && true_a <= r.a_ci_high)
        .count();
    let coverage = covered as f64 / n_taxa as f64;

    // nominal 90%; the percentile interval undercovers slightly at n = 20
    assert!(coverage >= 0.75, "coverage {}", coverage);
}

#[test]
fn test_pipeline_from_tsv() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("fractions.tsv");
    write_long_tsv(&input);

    let yaml = format!(
        r#"
name: cellulose
control: "substrate == '12C-Con'"
replicate_column: Replicate
isotope: 13C
input:
  format: long
  path: {}
output:
  dir: {}
steps:
  - !DeltaBd
    n: 20
    bd_min: null
    bd_max: null
    parallel: true
  - AtomExcess
  - !Bootstrap
    n_sample: [3, 3]
    n_boot: 50
    a: 0.1
    seed: 1
    parallel: false
"#,
        input.display(),
        dir.path().join("out").display()
    );
    let config = SipConfig::from_yaml(&yaml).unwrap();
    let table = config.input.as_ref().unwrap().load().unwrap();
    let output = Pipeline::from_config(&config).unwrap().run(&table).unwrap();

    assert!(output.delta_bd.unwrap().get("labeled_2").unwrap().delta_bd > 0.01);
    assert_eq!(output.bootstrap.as_ref().unwrap().len(), 7);

    let output = Pipeline::from_config(&config).unwrap().run(&table).unwrap();
    let written = output.write_tsv(&config.output).unwrap();
    assert_eq!(written.len(), 4);

    let boot_tsv = std::fs::read_to_string(dir.path().join("out/cellulose_bootstrap.tsv")).unwrap();
    let header = boot_tsv.lines().next().unwrap();
    assert_eq!(
        header,
        "taxon_id\tWlight\tWlab\tZ\tGi\tMlight\tMheavymax\tMlab\tA\tA_CI_low\tA_CI_high"
    );
    assert_eq!(boot_tsv.lines().count(), 8);
}

#[test]
fn test_matrix_input_matches_long_input() {
    let dir = TempDir::new().unwrap();
    let long_path = dir.path().join("fractions.tsv");
    let counts_path = dir.path().join("counts.tsv");
    let metadata_path = dir.path().join("samples.tsv");
    write_long_tsv(&long_path);
    write_matrix_tsv(&counts_path, &metadata_path);

    let long = InputConfig::Long { path: long_path }.load().unwrap();
    let matrix = InputConfig::Matrix {
        counts: counts_path,
        metadata: metadata_path,
        density_column: "Buoyant_density".to_string(),
    }
    .load()
    .unwrap();
    assert_eq!(long.len(), matrix.len());

    let a = qsip_atom_excess(&long, &control(), Some("Replicate"), Isotope::C13).unwrap();
    let b = qsip_atom_excess(&matrix, &control(), Some("Replicate"), Isotope::C13).unwrap();
    for (x, y) in a.a.iter().zip(&b.a) {
        assert_eq!(x.taxon_id, y.taxon_id);
        assert_relative_eq!(x.a, y.a, epsilon = 1e-9);
    }
}

#[test]
fn test_qpcr_rescaling_preserves_profiles_shape() {
    let table = create_table();
    let copies: std::collections::HashMap<String, f64> = table
        .metadata()
        .sample_ids()
        .iter()
        .map(|s| (s.clone(), 1.0e6))
        .collect();
    let rescaled = qpcr_rescale(&table, &copies).unwrap();

    // Uniform qPCR totals leave relative composition, and thus delta BD, unchanged
    let config = DeltaBdConfig::default();
    let before = delta_bd(&table, &control(), &config).unwrap();
    let after = delta_bd(&rescaled, &control(), &config).unwrap();
    for (x, y) in before.results.iter().zip(&after.results) {
        assert_relative_eq!(x.delta_bd, y.delta_bd, epsilon = 1e-9);
    }
}
