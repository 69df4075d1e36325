//! Detection assessment
//!
//! Compares the ground-truth fault label of every result row with the
//! detected fault context and derives sensitivity, specificity and the
//! F-score, per file and aggregated over a whole results directory.

use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use crate::layout::list_csv;
use crate::record::{create_writer, fmt_value, round2, sniff_columns, DETECTION_COLUMNS};
use crate::{HarnessError, Result};

const LABEL_COLUMN: usize = 15;
const CONTEXT_COLUMN: usize = 19;

const SUMMARY_HEADER: [&str; 10] = [
    "dataset",
    "value",
    "measurements",
    "true positives (TP)",
    "true negatives (TN)",
    "false positives (FP)",
    "false negatives (FN)",
    "sensitivity (TPR)",
    "specificity (TNR)",
    "accuracy (F-score)",
];

/// Confusion matrix of one result file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Confusion {
    pub measurements: usize,
    pub true_pos: usize,
    pub true_neg: usize,
    pub false_pos: usize,
    pub false_neg: usize,
}

impl Confusion {
    /// Count one (label, context) pair. Returns `false` if either value is
    /// not 0 or 1; nothing is counted in that case.
    pub fn observe(&mut self, label: i64, context: i64) -> bool {
        match (label, context) {
            (1, 1) => self.true_pos += 1,
            (0, 0) => self.true_neg += 1,
            (0, 1) => self.false_pos += 1,
            (1, 0) => self.false_neg += 1,
            _ => return false,
        }
        self.measurements += 1;
        true
    }

    pub fn metrics(&self) -> Metrics {
        let tp = self.true_pos as f64;
        let tn = self.true_neg as f64;
        let fp = self.false_pos as f64;
        let fn_ = self.false_neg as f64;
        Metrics {
            sensitivity: ratio_or_one(tp, tp + fn_),
            specificity: ratio_or_one(tn, tn + fp),
            f_score: ratio_or_one(tp, tp + 0.5 * (fp + fn_)),
        }
    }
}

/// A ratio with no observations counts as perfect. Only an empty
/// denominator yields 1; a file with faults that were all missed keeps its
/// TPR of 0 instead of being scored as perfect for having no hits.
fn ratio_or_one(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        round2(num / den)
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metrics {
    /// True positive rate
    pub sensitivity: f64,
    /// True negative rate
    pub specificity: f64,
    pub f_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAssessment {
    pub path: PathBuf,
    pub confusion: Confusion,
    pub metrics: Metrics,
}

impl FileAssessment {
    fn values(&self) -> [f64; 8] {
        let c = &self.confusion;
        [
            c.measurements as f64,
            c.true_pos as f64,
            c.true_neg as f64,
            c.false_pos as f64,
            c.false_neg as f64,
            self.metrics.sensitivity,
            self.metrics.specificity,
            self.metrics.f_score,
        ]
    }
}

/// Column-wise statistic over all assessed files, in summary column order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aggregate {
    pub measurements: f64,
    pub true_pos: f64,
    pub true_neg: f64,
    pub false_pos: f64,
    pub false_neg: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub f_score: f64,
}

impl Aggregate {
    fn from_values(v: [f64; 8]) -> Self {
        Self {
            measurements: v[0],
            true_pos: v[1],
            true_neg: v[2],
            false_pos: v[3],
            false_neg: v[4],
            sensitivity: v[5],
            specificity: v[6],
            f_score: v[7],
        }
    }

    fn values(&self) -> [f64; 8] {
        [
            self.measurements,
            self.true_pos,
            self.true_neg,
            self.false_pos,
            self.false_neg,
            self.sensitivity,
            self.specificity,
            self.f_score,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub files: Vec<FileAssessment>,
    pub mean: Aggregate,
    pub min: Aggregate,
    pub max: Aggregate,
}

impl Assessment {
    pub fn from_files(files: Vec<FileAssessment>) -> Option<Self> {
        if files.is_empty() {
            return None;
        }
        let n = files.len() as f64;
        let mut sum = [0.0; 8];
        let mut min = [f64::INFINITY; 8];
        let mut max = [f64::NEG_INFINITY; 8];
        for file in &files {
            for (i, v) in file.values().into_iter().enumerate() {
                sum[i] += v;
                min[i] = min[i].min(v);
                max[i] = max[i].max(v);
            }
        }
        let mean = sum.map(|s| round2(s / n));
        Some(Self {
            files,
            mean: Aggregate::from_values(mean),
            min: Aggregate::from_values(min),
            max: Aggregate::from_values(max),
        })
    }
}

fn parse_flag(path: &Path, line: usize, column: usize, raw: Option<&str>) -> Result<i64> {
    let raw = raw.map(str::trim).ok_or_else(|| HarnessError::Parse {
        path: path.to_path_buf(),
        line,
        column,
        message: "missing field".to_string(),
    })?;
    raw.parse::<i64>().map_err(|e| HarnessError::Parse {
        path: path.to_path_buf(),
        line,
        column,
        message: format!("invalid integer '{raw}': {e}"),
    })
}

/// Assess a single detection result file.
pub fn assess_file(path: &Path) -> Result<FileAssessment> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut confusion = Confusion::default();
    for row in reader.records() {
        let row = row?;
        let line = row.position().map(|p| p.line() as usize).unwrap_or(0);
        let label = parse_flag(path, line, LABEL_COLUMN, row.get(LABEL_COLUMN))?;
        let context = parse_flag(path, line, CONTEXT_COLUMN, row.get(CONTEXT_COLUMN))?;
        if !confusion.observe(label, context) {
            return Err(HarnessError::InvalidLabel {
                path: path.to_path_buf(),
                line,
                label,
                context,
            });
        }
    }

    debug!(path = %path.display(), ?confusion, "assessed result file");
    Ok(FileAssessment {
        path: path.to_path_buf(),
        metrics: confusion.metrics(),
        confusion,
    })
}

/// Assess every detection result file in `dir`, ordered by name. Faulty
/// dataset copies and single-file reports sharing the directory are skipped.
pub fn assess_directory(dir: &Path) -> Result<Assessment> {
    if !dir.is_dir() {
        return Err(HarnessError::NoResults(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for path in list_csv(dir)? {
        let columns = sniff_columns(&path)?;
        if columns < DETECTION_COLUMNS {
            warn!(path = %path.display(), columns, "not a detection result file, skipped");
            continue;
        }
        files.push(assess_file(&path)?);
    }
    Assessment::from_files(files).ok_or_else(|| HarnessError::NoResults(dir.to_path_buf()))
}

/// Counts print as integers in the min/max rows, everything else as a
/// two-decimal value.
fn stat_fields(values: [f64; 8], integral_counts: bool) -> Vec<String> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if integral_counts && i < 5 {
                format!("{v:.0}")
            } else {
                fmt_value(*v)
            }
        })
        .collect()
}

pub fn write_summary_csv(path: &Path, assessment: &Assessment) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(SUMMARY_HEADER)?;

    let total = format!("total ({} datasets)", assessment.files.len());
    for (label, agg, integral) in [
        ("mean", &assessment.mean, false),
        ("min", &assessment.min, true),
        ("max", &assessment.max, true),
    ] {
        let mut record = vec![total.clone(), label.to_string()];
        record.extend(stat_fields(agg.values(), integral));
        writer.write_record(&record)?;
    }

    for file in &assessment.files {
        let mut record = vec![file.path.display().to_string(), "-".to_string()];
        record.extend(stat_fields(file.values(), true));
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Single-file report (`<stem>-result.csv`).
pub fn write_file_report(path: &Path, file: &FileAssessment) -> Result<()> {
    let mut writer = create_writer(path)?;
    writer.write_record(
        std::iter::once("input file").chain(SUMMARY_HEADER.iter().skip(2).copied()),
    )?;
    let mut record = vec![file.path.display().to_string()];
    record.extend(stat_fields(file.values(), true));
    writer.write_record(&record)?;
    writer.flush()?;
    Ok(())
}
