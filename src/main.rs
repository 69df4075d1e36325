use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use asnx_ddca::batch::{assess_results, assess_single, inject_dataset};
use asnx_ddca::layout::Layout;
use asnx_ddca::plot::plot_file;
use asnx_ddca::{plot_results, rerun_simulation, simulate_dataset, DetectorKind, HarnessConfig};

#[derive(Debug, Parser)]
#[command(author, version, about = "Fault injection, dDCA detection and assessment for ASN(x) datasets")]
struct Cli {
    /// Working directory holding base_datasets/, fault_signatures/ and the outputs
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run N simulations per base dataset, then plot and assess all results
    Rerun {
        /// Number of runs per dataset
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        runs: u64,
    },
    /// Plot every file in results/
    Plot {
        /// 1 for a transparent background
        #[arg(default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
        transparency: u8,
    },
    /// Assess every file in results/ and write the summary
    Assess,
    /// Inject faults into one dataset and run a detector over it
    Simulate {
        dataset: PathBuf,
        /// Detector to run; defaults to the configured one
        #[arg(long, value_enum)]
        detector: Option<DetectorKind>,
        /// Run index used in the output file name
        #[arg(long, default_value_t = 1)]
        run: usize,
    },
    /// Inject faults into one dataset and write the faulty copy
    Inject { dataset: PathBuf },
    /// Plot a single dataset or result file
    Visualize {
        file: PathBuf,
        /// 1 for a transparent background
        #[arg(default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
        transparency: u8,
    },
    /// Assess a single result file
    AssessFile { file: PathBuf },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HarnessConfig> {
    match path {
        Some(path) => HarnessConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(HarnessConfig::default()),
    }
}

/// Usage errors exit with 1; `--help` and `--version` exit with 0.
fn usage_exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print()?;
            std::process::exit(usage_exit_code(&err));
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    run(cli)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = load_config(cli.config.as_ref())?;
    let layout = Layout::new(&cli.root);

    match cli.command {
        Commands::Rerun { runs } => {
            let runs = usize::try_from(runs).context("run count out of range")?;
            let report = rerun_simulation(&cfg, &layout, runs)
                .with_context(|| format!("batch failed in {}", layout.root.display()))?;
            println!(
                "Batch complete. Results: {} | Plots: {} | Failures: {}",
                report.results.len(),
                report.plots.len(),
                report.failures.len()
            );
            if let Some(summary) = &report.summary {
                println!("Summary: {}", summary.display());
            }
        }
        Commands::Plot { transparency } => {
            let report = plot_results(&layout, transparency == 1)
                .with_context(|| format!("failed to plot {}", layout.results.display()))?;
            println!(
                "Plots written: {} | Failures: {}",
                report.written.len(),
                report.failures.len()
            );
        }
        Commands::Assess => {
            let (path, assessment) = assess_results(&layout)
                .with_context(|| format!("failed to assess {}", layout.results.display()))?;
            println!(
                "Assessed {} files | mean TPR {:.2} TNR {:.2} F {:.2}",
                assessment.files.len(),
                assessment.mean.sensitivity,
                assessment.mean.specificity,
                assessment.mean.f_score
            );
            println!("Summary: {}", path.display());
        }
        Commands::Simulate {
            dataset,
            detector,
            run,
        } => {
            let kind = detector.unwrap_or(cfg.detector);
            let outcome = simulate_dataset(&cfg, &layout, &dataset, run, kind)
                .with_context(|| format!("failed to simulate {}", dataset.display()))?;
            println!(
                "{}: {} rows, {} faults injected -> {}",
                kind,
                outcome.rows,
                outcome.injection.placed.len(),
                outcome.output.display()
            );
        }
        Commands::Inject { dataset } => {
            let (path, report) = inject_dataset(&cfg, &layout, &dataset)
                .with_context(|| format!("failed to inject faults into {}", dataset.display()))?;
            println!(
                "{} faults injected ({} skipped) -> {}",
                report.placed.len(),
                report.skipped,
                path.display()
            );
        }
        Commands::Visualize { file, transparency } => {
            let output = layout.plot_path(&file);
            plot_file(&file, &output, transparency == 1)
                .with_context(|| format!("failed to plot {}", file.display()))?;
            println!("Plot written to {}", output.display());
        }
        Commands::AssessFile { file } => {
            let path = assess_single(&layout, &file)
                .with_context(|| format!("failed to assess {}", file.display()))?;
            println!("Report written to {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use asnx_ddca::record::{write_sensor_records, Readings, SensorRecord};

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("asnx-ddca").chain(args.iter().copied()))
    }

    #[test]
    fn rerun_takes_exactly_one_count() {
        match parse(&["rerun", "5"]).unwrap().command {
            Commands::Rerun { runs } => assert_eq!(runs, 5),
            other => panic!("unexpected command: {other:?}"),
        }

        for args in [&["rerun"][..], &["rerun", "1", "2"], &["rerun", "0"], &["rerun", "x"]] {
            let err = parse(args).unwrap_err();
            assert_eq!(usage_exit_code(&err), 1, "{args:?}");
        }
    }

    #[test]
    fn help_and_version_exit_cleanly() {
        for args in [&["--help"][..], &["--version"], &["rerun", "--help"]] {
            let err = parse(args).unwrap_err();
            assert_eq!(usage_exit_code(&err), 0, "{args:?}");
        }
    }

    #[test]
    fn plot_transparency_defaults_to_zero() {
        match parse(&["plot"]).unwrap().command {
            Commands::Plot { transparency } => assert_eq!(transparency, 0),
            other => panic!("unexpected command: {other:?}"),
        }
        match parse(&["plot", "1"]).unwrap().command {
            Commands::Plot { transparency } => assert_eq!(transparency, 1),
            other => panic!("unexpected command: {other:?}"),
        }
        for value in ["2", "-1", "yes"] {
            let err = parse(&["plot", value]).unwrap_err();
            assert_eq!(usage_exit_code(&err), 1, "{value}");
        }
    }

    #[test]
    fn global_options_follow_the_subcommand() {
        let cli = parse(&["simulate", "d.csv", "--detector", "ddca-weighted", "--root", "/tmp/x"])
            .unwrap();
        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Simulate {
                detector, run, ..
            } => {
                assert_eq!(detector, Some(DetectorKind::DdcaWeighted));
                assert_eq!(run, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn visualize_writes_into_plots() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("indoor.csv");
        let rows: Vec<SensorRecord> = (0..6)
            .map(|i| SensorRecord {
                snid: "a1".to_string(),
                timestamp: 1_620_000_000 + 600 * i,
                sntime: 600 * i,
                readings: Readings::new(20.0, 18.0, 45.0, 60.0),
                indicators: [0.0; 8],
                label: 0,
            })
            .collect();
        write_sensor_records(&input, &rows).unwrap();

        let root = dir.path().to_str().unwrap();
        let file = input.to_str().unwrap();
        run(parse(&["--root", root, "visualize", file]).unwrap()).unwrap();
        assert!(dir.path().join("plots").join("indoor-plot.svg").is_file());
    }
}
