//! Filesystem layout and file naming conventions shared by all drivers.

use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

pub const BASE_DATASETS_DIR: &str = "base_datasets";
pub const FAULT_SIGNATURES_DIR: &str = "fault_signatures";
pub const RESULTS_DIR: &str = "results";
pub const PLOTS_DIR: &str = "plots";
pub const SIM_RESULTS_DIR: &str = "sim_results";
pub const SUMMARY_FILE: &str = "simulation_assessment_result.csv";
pub const MANIFEST_FILE: &str = "batch_manifest.json";

/// Infix of the per-run result files written by the batch driver.
pub const RESULT_INFIX: &str = "-ddca_with_faults-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub base_datasets: PathBuf,
    pub fault_signatures: PathBuf,
    pub results: PathBuf,
    pub plots: PathBuf,
    pub sim_results: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_datasets: root.join(BASE_DATASETS_DIR),
            fault_signatures: root.join(FAULT_SIGNATURES_DIR),
            results: root.join(RESULTS_DIR),
            plots: root.join(PLOTS_DIR),
            sim_results: root.join(SIM_RESULTS_DIR),
            root,
        }
    }

    /// `results/<dataset-stem>-ddca_with_faults-<run>.csv`
    pub fn result_path(&self, dataset: &Path, run: usize) -> PathBuf {
        self.results
            .join(format!("{}{RESULT_INFIX}{run}.csv", file_stem(dataset)))
    }

    /// `results/<stem><suffix>.csv`, used by the single-file tools.
    pub fn derived_result_path(&self, input: &Path, suffix: &str) -> PathBuf {
        self.results.join(format!("{}{suffix}.csv", file_stem(input)))
    }

    /// `plots/<stem>-plot.svg`
    pub fn plot_path(&self, input: &Path) -> PathBuf {
        self.plots.join(format!("{}-plot.svg", file_stem(input)))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.sim_results.join(SUMMARY_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.sim_results.join(MANIFEST_FILE)
    }

    pub fn ensure_output_dirs(&self) -> Result<()> {
        for dir in [&self.results, &self.plots, &self.sim_results] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "csv" || e == "CSV")
        .unwrap_or(false)
}

/// Regular `.csv`/`.CSV` files directly inside `dir`, sorted by path.
pub fn list_csv(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_names_follow_the_run_convention() {
        let layout = Layout::new("/data");
        let path = layout.result_path(Path::new("base_datasets/indoor_-_stable.csv"), 3);
        assert_eq!(
            path,
            PathBuf::from("/data/results/indoor_-_stable-ddca_with_faults-3.csv")
        );
        assert_eq!(
            layout.plot_path(&path),
            PathBuf::from("/data/plots/indoor_-_stable-ddca_with_faults-3-plot.svg")
        );
    }

    #[test]
    fn csv_listing_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.CSV"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();
        fs::write(dir.path().join("c.svg"), "").unwrap();
        fs::create_dir(dir.path().join("d.csv")).unwrap();

        let files = list_csv(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.csv", "b.CSV"]);
    }
}
