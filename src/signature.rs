//! Fault signatures
//!
//! A signature file uses the dataset column layout. The node id and the
//! two time columns are ignored; the use-case readings are additive
//! deltas, indicators and the label replace the dataset values.

use std::path::{Path, PathBuf};

use crate::layout::list_csv;
use crate::record::{read_sensor_records, Readings};
use crate::{HarnessError, Result};

/// One step of a fault pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultStep {
    pub delta: Readings,
    pub indicators: [f64; 8],
    pub label: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaultSignature {
    pub name: String,
    pub steps: Vec<FaultStep>,
}

impl FaultSignature {
    pub fn new(name: impl Into<String>, steps: Vec<FaultStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let steps: Vec<FaultStep> = read_sensor_records(path)?
            .into_iter()
            .map(|row| FaultStep {
                delta: row.readings,
                indicators: row.indicators,
                label: row.label,
            })
            .collect();

        if steps.is_empty() {
            return Err(HarnessError::InvalidSignature {
                path: path.to_path_buf(),
                reason: "signature has no rows".to_string(),
            });
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(name, steps))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Load every `*.csv` signature in `dir`, ordered by file name.
pub fn load_signatures(dir: &Path) -> Result<Vec<FaultSignature>> {
    let paths: Vec<PathBuf> = list_csv(dir)?;
    paths.iter().map(|p| FaultSignature::from_path(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const HEADER: &str = "snid,ts,sntime,ta,ts,ha,hs,x1,x2,x3,x4,x5,x6,x7,x8,fault\n";

    #[test]
    fn signature_rows_become_steps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spike.csv");
        fs::write(
            &path,
            format!("{HEADER}-,0,0,5.0,0,0,0,0,0,0,0,0,0,0.8,0,1\n-,0,0,2.5,0,0,0,0,0,0,0,0,0,0.4,0,1\n"),
        )
        .unwrap();

        let sig = FaultSignature::from_path(&path).unwrap();
        assert_eq!(sig.name, "spike");
        assert_eq!(sig.len(), 2);
        assert_eq!(sig.steps[0].delta.t_air, 5.0);
        assert_eq!(sig.steps[1].indicators[6], 0.4);
        assert_eq!(sig.steps[1].label, 1);
    }

    #[test]
    fn empty_signature_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        fs::write(&path, HEADER).unwrap();
        assert!(matches!(
            FaultSignature::from_path(&path),
            Err(HarnessError::InvalidSignature { .. })
        ));
    }

    #[test]
    fn signatures_load_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        let row = "-,0,0,1,0,0,0,0,0,0,0,0,0,0,0,1\n";
        fs::write(dir.path().join("b.csv"), format!("{HEADER}{row}")).unwrap();
        fs::write(dir.path().join("a.csv"), format!("{HEADER}{row}")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let sigs = load_signatures(dir.path()).unwrap();
        let names: Vec<&str> = sigs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
