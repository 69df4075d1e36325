//! Batch drivers
//!
//! The rerun driver injects faults into every base dataset `N` times, runs
//! the detector over each faulty copy, plots every result and writes the
//! assessment summary. Per-item failures are logged and collected so one
//! bad file never aborts the batch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::assess::{assess_directory, assess_file, write_file_report, write_summary_csv, Assessment};
use crate::config::HarnessConfig;
use crate::detector::{build_detector, run_detector, DetectorKind};
use crate::inject::{derive_seed, FaultInjector, InjectionReport};
use crate::layout::{file_stem, list_csv, Layout};
use crate::plot::plot_file;
use crate::record::{
    read_sensor_records, sniff_columns, write_detection_records, write_sensor_records,
    SENSOR_COLUMNS,
};
use crate::signature::{load_signatures, FaultSignature};
use crate::{HarnessError, Result};

/// Suffix of the faulty copy written by the standalone injector.
pub const FAULTY_SUFFIX: &str = "-faulty";
/// Suffix of the single-file assessment report.
pub const REPORT_SUFFIX: &str = "-result";

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub dataset: PathBuf,
    pub run: usize,
    pub output: PathBuf,
    pub rows: usize,
    pub seed: Option<u64>,
    pub injection: InjectionReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub item: PathBuf,
    pub run: Option<usize>,
    pub error: String,
}

impl Failure {
    fn new(item: &Path, run: Option<usize>, err: &HarnessError) -> Self {
        Self {
            item: item.to_path_buf(),
            run,
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PlotReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

/// Everything a rerun batch produced; also written as the JSON manifest.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub runs: usize,
    pub seed: Option<u64>,
    pub detector: DetectorKind,
    pub datasets: Vec<PathBuf>,
    pub results: Vec<RunOutcome>,
    pub plots: Vec<PathBuf>,
    pub summary: Option<PathBuf>,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    fn new(cfg: &HarnessConfig, runs: usize) -> Self {
        Self {
            runs,
            seed: cfg.seed,
            detector: cfg.detector,
            datasets: Vec::new(),
            results: Vec::new(),
            plots: Vec::new(),
            summary: None,
            failures: Vec::new(),
        }
    }
}

fn injector_for(
    cfg: &HarnessConfig,
    signatures: &[FaultSignature],
    dataset: &Path,
    run: usize,
) -> (FaultInjector, Option<u64>) {
    let seed = cfg.seed.map(|base| derive_seed(base, &file_stem(dataset), run));
    let injector = FaultInjector::new(signatures.to_vec(), cfg.injection.clone(), seed);
    (injector, seed)
}

fn simulate_with(
    cfg: &HarnessConfig,
    layout: &Layout,
    signatures: &[FaultSignature],
    dataset: &Path,
    run: usize,
    kind: DetectorKind,
) -> Result<RunOutcome> {
    let mut records = read_sensor_records(dataset)?;
    if records.is_empty() {
        return Err(HarnessError::EmptyDataset(dataset.to_path_buf()));
    }

    let (mut injector, seed) = injector_for(cfg, signatures, dataset, run);
    let injection = injector.inject(&mut records);

    let mut detector = build_detector(kind, cfg);
    let detections = run_detector(detector.as_mut(), &records);

    let output = layout.result_path(dataset, run);
    write_detection_records(&output, &detections)?;
    debug!(
        dataset = %dataset.display(),
        run,
        detector = detector.name(),
        faults = injection.placed.len(),
        output = %output.display(),
        "simulation run written"
    );

    Ok(RunOutcome {
        dataset: dataset.to_path_buf(),
        run,
        output,
        rows: detections.len(),
        seed,
        injection,
    })
}

/// Inject faults into one dataset, run `kind` over it and write
/// `results/<stem>-ddca_with_faults-<run>.csv`.
pub fn simulate_dataset(
    cfg: &HarnessConfig,
    layout: &Layout,
    dataset: &Path,
    run: usize,
    kind: DetectorKind,
) -> Result<RunOutcome> {
    let signatures = load_signatures(&layout.fault_signatures)?;
    simulate_with(cfg, layout, &signatures, dataset, run, kind)
}

/// Inject faults into one dataset and write `results/<stem>-faulty.csv`.
pub fn inject_dataset(
    cfg: &HarnessConfig,
    layout: &Layout,
    dataset: &Path,
) -> Result<(PathBuf, InjectionReport)> {
    let signatures = load_signatures(&layout.fault_signatures)?;
    let mut records = read_sensor_records(dataset)?;
    if records.is_empty() {
        return Err(HarnessError::EmptyDataset(dataset.to_path_buf()));
    }

    let (mut injector, _) = injector_for(cfg, &signatures, dataset, 1);
    let report = injector.inject(&mut records);

    let output = layout.derived_result_path(dataset, FAULTY_SUFFIX);
    write_sensor_records(&output, &records)?;
    info!(
        dataset = %dataset.display(),
        faults = report.placed.len(),
        skipped = report.skipped,
        output = %output.display(),
        "faults injected"
    );
    Ok((output, report))
}

/// Plot every file in `results/` into `plots/<stem>-plot.svg`.
pub fn plot_results(layout: &Layout, transparent: bool) -> Result<PlotReport> {
    fs::create_dir_all(&layout.plots)?;
    let inputs = list_csv(&layout.results)?;
    info!(files = inputs.len(), transparent, "plotting results");

    let mut report = PlotReport::default();
    for input in &inputs {
        match sniff_columns(input) {
            Ok(columns) if columns < SENSOR_COLUMNS => {
                debug!(input = %input.display(), columns, "not a dataset or result file, skipped");
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                error!(input = %input.display(), error = %err, "plot failed");
                report.failures.push(Failure::new(input, None, &err));
                continue;
            }
        }
        let output = layout.plot_path(input);
        match plot_file(input, &output, transparent) {
            Ok(kind) => {
                debug!(input = %input.display(), ?kind, "plot written");
                report.written.push(output);
            }
            Err(err) => {
                error!(input = %input.display(), error = %err, "plot failed");
                report.failures.push(Failure::new(input, None, &err));
            }
        }
    }
    Ok(report)
}

/// Assess `results/` and write the summary CSV.
pub fn assess_results(layout: &Layout) -> Result<(PathBuf, Assessment)> {
    let assessment = assess_directory(&layout.results)?;
    let path = layout.summary_path();
    write_summary_csv(&path, &assessment)?;
    info!(
        files = assessment.files.len(),
        mean_f_score = assessment.mean.f_score,
        summary = %path.display(),
        "assessment written"
    );
    Ok((path, assessment))
}

/// Assess one result file and write `results/<stem>-result.csv`.
pub fn assess_single(layout: &Layout, input: &Path) -> Result<PathBuf> {
    let assessment = assess_file(input)?;
    let path = layout.derived_result_path(input, REPORT_SUFFIX);
    write_file_report(&path, &assessment)?;
    info!(
        input = %input.display(),
        tpr = assessment.metrics.sensitivity,
        tnr = assessment.metrics.specificity,
        f_score = assessment.metrics.f_score,
        "file assessed"
    );
    Ok(path)
}

fn write_manifest(path: &Path, report: &BatchReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let payload = serde_json::to_string_pretty(report)?;
    fs::write(path, payload)?;
    Ok(())
}

/// Run the full batch: `runs` simulations per base dataset, then plots and
/// the assessment summary.
pub fn rerun_simulation(cfg: &HarnessConfig, layout: &Layout, runs: usize) -> Result<BatchReport> {
    if runs == 0 {
        return Err(HarnessError::InvalidConfig(
            "number of runs must be at least 1".to_string(),
        ));
    }
    layout.ensure_output_dirs()?;

    let datasets = list_csv(&layout.base_datasets)?;
    let signatures = load_signatures(&layout.fault_signatures)?;
    if signatures.is_empty() {
        warn!(dir = %layout.fault_signatures.display(), "no fault signatures, datasets stay fault-free");
    }
    info!(
        datasets = datasets.len(),
        signatures = signatures.len(),
        runs,
        detector = %cfg.detector,
        "starting simulation batch"
    );

    let mut report = BatchReport::new(cfg, runs);
    for dataset in &datasets {
        for run in 1..=runs {
            match simulate_with(cfg, layout, &signatures, dataset, run, cfg.detector) {
                Ok(outcome) => report.results.push(outcome),
                Err(err) => {
                    error!(dataset = %dataset.display(), run, error = %err, "simulation run failed");
                    report.failures.push(Failure::new(dataset, Some(run), &err));
                }
            }
        }
    }
    report.datasets = datasets;
    info!(
        written = report.results.len(),
        failed = report.failures.len(),
        "simulation phase finished"
    );

    let plots = plot_results(layout, false)?;
    report.plots = plots.written;
    report.failures.extend(plots.failures);

    match assess_results(layout) {
        Ok((path, _)) => report.summary = Some(path),
        Err(err) => {
            error!(error = %err, "assessment failed");
            report.failures.push(Failure::new(&layout.results, None, &err));
        }
    }

    write_manifest(&layout.manifest_path(), &report)?;
    info!(
        results = report.results.len(),
        plots = report.plots.len(),
        failures = report.failures.len(),
        "batch finished"
    );
    Ok(report)
}
