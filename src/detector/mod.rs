//! Node-level fault detectors
//!
//! Every detector consumes dataset rows one at a time and emits the row
//! extended with its interim signals and the detected fault context.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::record::{DetectionRecord, SensorRecord};

pub mod ddca;
pub mod outlier;

pub use ddca::{ContextAssessment, DdcaDetector, DendriticCell};
pub use outlier::{OutlierDetector, Welford};

pub trait Detector {
    fn name(&self) -> &'static str;
    fn reset(&mut self);
    fn step(&mut self, record: &SensorRecord) -> DetectionRecord;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorKind {
    /// dDCA with majority voting over the cell population
    #[default]
    Ddca,
    /// dDCA with age-weighted voting
    DdcaWeighted,
    /// Windowed standard-deviation outlier baseline
    Outlier,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Ddca => "ddca",
            DetectorKind::DdcaWeighted => "ddca-weighted",
            DetectorKind::Outlier => "outlier",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn build_detector(kind: DetectorKind, cfg: &HarnessConfig) -> Box<dyn Detector> {
    match kind {
        DetectorKind::Ddca => Box::new(DdcaDetector::new(&cfg.ddca, ContextAssessment::Voting)),
        DetectorKind::DdcaWeighted => {
            Box::new(DdcaDetector::new(&cfg.ddca, ContextAssessment::Weighted))
        }
        DetectorKind::Outlier => Box::new(OutlierDetector::new(&cfg.outlier)),
    }
}

/// Reset the detector and run it over a whole dataset.
pub fn run_detector(detector: &mut dyn Detector, records: &[SensorRecord]) -> Vec<DetectionRecord> {
    detector.reset();
    records.iter().map(|r| detector.step(r)).collect()
}
