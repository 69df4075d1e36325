//! ASN(x) dDCA harness
//!
//! Injects synthetic faults into recorded sensor-node datasets, runs the
//! deterministic dendritic cell algorithm (dDCA) over the faulty data, and
//! assesses the detection results against the injected fault labels.

pub mod assess;
pub mod batch;
pub mod config;
pub mod detector;
pub mod indicators;
pub mod inject;
pub mod layout;
pub mod plot;
pub mod record;
pub mod signature;

use std::path::PathBuf;

use thiserror::Error;

// Re-export main types
pub use assess::{assess_directory, assess_file, Assessment, Confusion, FileAssessment, Metrics};
pub use batch::{plot_results, rerun_simulation, simulate_dataset, BatchReport};
pub use config::HarnessConfig;
pub use detector::{run_detector, DdcaDetector, Detector, DetectorKind, OutlierDetector};
pub use inject::{FaultInjector, InjectionReport};
pub use layout::Layout;
pub use record::{DetectionRecord, SensorRecord};
pub use signature::FaultSignature;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{path}:{line}: column {column}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("{path}:{line}: label/context must be 0 or 1, got label={label} context={context}")]
    InvalidLabel {
        path: PathBuf,
        line: usize,
        label: i64,
        context: i64,
    },
    #[error("invalid fault signature {path}: {reason}")]
    InvalidSignature { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("dataset {0} contains no rows")]
    EmptyDataset(PathBuf),
    #[error("no result files found in {0}")]
    NoResults(PathBuf),
    #[error("plot error: {0}")]
    Plot(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
