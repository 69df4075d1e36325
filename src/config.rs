//! Harness configuration, loaded from TOML with every field defaulted.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::detector::DetectorKind;
use crate::{HarnessError, Result};

/// dDCA tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DdcaParams {
    /// Dendritic cell population (and lifetime in samples)
    pub dc_population: usize,
    /// Number of readings kept per channel for the safe-signal std-dev
    pub stddev_window: usize,
    /// Sensitivity of the safe indicator
    pub safe_sensitivity: f64,
}

impl Default for DdcaParams {
    fn default() -> Self {
        Self {
            dc_population: 3,
            stddev_window: 10,
            safe_sensitivity: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InjectionParams {
    /// Upper bound (inclusive) of faults injected per dataset
    pub max_faults: usize,
    /// Placement draws per fault before it is skipped
    pub max_placement_attempts: usize,
}

impl Default for InjectionParams {
    fn default() -> Self {
        Self {
            max_faults: 10,
            max_placement_attempts: 10_000,
        }
    }
}

/// Windowed Welford outlier baseline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutlierParams {
    pub window: usize,
    /// Standard deviation at or above which a channel is flagged
    pub threshold: f64,
    /// Feed the danger indicator as an extra channel
    pub include_diagnostics: bool,
}

impl Default for OutlierParams {
    fn default() -> Self {
        Self {
            window: 15,
            threshold: 3.0,
            include_diagnostics: false,
        }
    }
}

/// Harness configuration, loadable from TOML. Every field has a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base seed for fault injection; `None` draws from entropy
    pub seed: Option<u64>,
    pub detector: DetectorKind,
    pub ddca: DdcaParams,
    pub injection: InjectionParams,
    pub outlier: OutlierParams,
}

impl HarnessConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: HarnessConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ddca.dc_population == 0 {
            return Err(HarnessError::InvalidConfig(
                "ddca.dc_population must be greater than zero".to_string(),
            ));
        }
        if self.ddca.stddev_window == 0 {
            return Err(HarnessError::InvalidConfig(
                "ddca.stddev_window must be greater than zero".to_string(),
            ));
        }
        if !self.ddca.safe_sensitivity.is_finite() || self.ddca.safe_sensitivity <= 0.0 {
            return Err(HarnessError::InvalidConfig(
                "ddca.safe_sensitivity must be finite and positive".to_string(),
            ));
        }
        if self.injection.max_placement_attempts == 0 {
            return Err(HarnessError::InvalidConfig(
                "injection.max_placement_attempts must be greater than zero".to_string(),
            ));
        }
        if self.outlier.window == 0 {
            return Err(HarnessError::InvalidConfig(
                "outlier.window must be greater than zero".to_string(),
            ));
        }
        if !self.outlier.threshold.is_finite() || self.outlier.threshold <= 0.0 {
            return Err(HarnessError::InvalidConfig(
                "outlier.threshold must be finite and positive".to_string(),
            ));
        }
        Ok(())
    }
}
