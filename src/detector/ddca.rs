//! Deterministic dendritic cell algorithm
//!
//! Per sample: derive danger and safe signals, let every live dendritic
//! cell accumulate the sample context `danger - safe`, spawn a new cell,
//! evict the oldest once the population is exceeded, and assess the fault
//! context from the cells that currently see danger.

use std::collections::VecDeque;

use crate::config::DdcaParams;
use crate::indicators::{danger, SafeSignal};
use crate::record::{DetectionRecord, SensorRecord};

use super::Detector;

/// How the cell population votes on the fault context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAssessment {
    /// Every cell counts once
    Voting,
    /// Younger cells weigh more (`age - oldest_age + 1`)
    Weighted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DendriticCell {
    pub antigen: String,
    /// Accumulated context value
    pub context: f64,
    /// Index of the sample the cell was born at
    pub age: usize,
}

pub struct DdcaDetector {
    population: usize,
    assessment: ContextAssessment,
    safe: SafeSignal,
    cells: VecDeque<DendriticCell>,
    samples: usize,
}

impl DdcaDetector {
    pub fn new(params: &DdcaParams, assessment: ContextAssessment) -> Self {
        let population = params.dc_population.max(1);
        Self {
            population,
            assessment,
            safe: SafeSignal::new(params.stddev_window, params.safe_sensitivity),
            cells: VecDeque::with_capacity(population + 1),
            samples: 0,
        }
    }

    pub fn cells(&self) -> impl Iterator<Item = &DendriticCell> {
        self.cells.iter()
    }

    fn update_cells(&mut self, antigen: &str, context: f64) {
        for cell in self.cells.iter_mut() {
            cell.context += context;
        }
        self.cells.push_back(DendriticCell {
            antigen: antigen.to_string(),
            context,
            age: self.samples,
        });
        if self.cells.len() > self.population {
            self.cells.pop_front();
        }
    }

    /// Fraction (plain or age-weighted) of cells with a non-negative context.
    fn state(&self) -> f64 {
        let Some(oldest) = self.cells.front().map(|c| c.age) else {
            return 0.0;
        };

        let mut total = 0.0;
        let mut danger_votes = 0.0;
        for cell in &self.cells {
            let weight = match self.assessment {
                ContextAssessment::Voting => 1.0,
                ContextAssessment::Weighted => (cell.age - oldest + 1) as f64,
            };
            total += weight;
            if cell.context >= 0.0 {
                danger_votes += weight;
            }
        }
        danger_votes / total
    }
}

impl Detector for DdcaDetector {
    fn name(&self) -> &'static str {
        match self.assessment {
            ContextAssessment::Voting => "ddca",
            ContextAssessment::Weighted => "ddca-weighted",
        }
    }

    fn reset(&mut self) {
        self.safe.reset();
        self.cells.clear();
        self.samples = 0;
    }

    fn step(&mut self, record: &SensorRecord) -> DetectionRecord {
        // The node id is the antigen; no spatial correlation between nodes.
        let antigen = record.snid.clone();
        let danger = danger(record);
        let safe = self.safe.update(record);

        self.update_cells(&antigen, danger - safe);
        let context = u8::from(self.state() > 0.5);
        self.samples += 1;

        DetectionRecord {
            sensor: record.clone(),
            antigen,
            danger,
            safe,
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::run_detector;
    use crate::record::tests::sample;

    fn detector(population: usize, assessment: ContextAssessment) -> DdcaDetector {
        let params = DdcaParams {
            dc_population: population,
            ..DdcaParams::default()
        };
        DdcaDetector::new(&params, assessment)
    }

    fn faulty(indicator: f64) -> SensorRecord {
        let mut r = sample(1);
        r.indicators = [indicator, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        r
    }

    #[test]
    fn clean_data_is_normal() {
        let mut det = detector(3, ContextAssessment::Voting);
        let mut clean = sample(0);
        clean.indicators = [0.0; 8];
        let out = run_detector(&mut det, &vec![clean; 6]);
        for row in &out {
            assert_eq!(row.danger, 0.0);
            assert_eq!(row.safe, 1.0);
            assert_eq!(row.context, 0);
            assert_eq!(row.antigen, "3d");
        }
    }

    #[test]
    fn saturated_indicator_is_faulty() {
        let mut det = detector(3, ContextAssessment::Voting);
        let out = run_detector(&mut det, &vec![faulty(1.0); 6]);
        assert!(out.iter().all(|r| r.danger == 1.0 && r.context == 1));
    }

    #[test]
    fn population_is_capped() {
        let mut det = detector(3, ContextAssessment::Voting);
        run_detector(&mut det, &vec![sample(0); 10]);
        let ages: Vec<usize> = det.cells().map(|c| c.age).collect();
        assert_eq!(ages, [7, 8, 9]);
    }

    #[test]
    fn voting_needs_a_majority() {
        // Constant readings keep safe at 1, so a clean sample adds -1 and a
        // saturated one adds 0. After clean, fault: cells -1, 0 (1/2).
        // After a second fault: cells -1, 0, 0 (2/3).
        let mut clean = sample(0);
        clean.indicators = [0.0; 8];
        let rows = vec![clean, faulty(1.0), faulty(1.0)];

        let mut det = detector(3, ContextAssessment::Voting);
        let out = run_detector(&mut det, &rows);
        assert_eq!(out[0].context, 0);
        assert_eq!(out[1].context, 0);
        assert_eq!(out[2].context, 1);
    }

    #[test]
    fn weighted_favours_young_cells() {
        // Cells after clean, fault: age 0 at -1 (weight 1), age 1 at 0
        // (weight 2). Voting sees 1/2, weighting sees 2/3.
        let mut clean = sample(0);
        clean.indicators = [0.0; 8];
        let rows = vec![clean, faulty(1.0)];

        let mut voting = detector(2, ContextAssessment::Voting);
        let mut weighted = detector(2, ContextAssessment::Weighted);
        let v = run_detector(&mut voting, &rows);
        let w = run_detector(&mut weighted, &rows);
        assert_eq!(v[1].context, 0);
        assert_eq!(w[1].context, 1);
    }

    #[test]
    fn single_cell_modes_agree() {
        let rows: Vec<SensorRecord> = (0..8)
            .map(|i| faulty(if i % 3 == 0 { 1.0 } else { 0.0 }))
            .collect();
        let mut voting = detector(1, ContextAssessment::Voting);
        let mut weighted = detector(1, ContextAssessment::Weighted);
        let v = run_detector(&mut voting, &rows);
        let w = run_detector(&mut weighted, &rows);
        let vc: Vec<u8> = v.iter().map(|r| r.context).collect();
        let wc: Vec<u8> = w.iter().map(|r| r.context).collect();
        assert_eq!(vc, wc);
    }

    #[test]
    fn reset_clears_state() {
        let mut det = detector(3, ContextAssessment::Voting);
        run_detector(&mut det, &vec![faulty(1.0); 4]);
        det.reset();
        assert_eq!(det.cells().count(), 0);
    }
}
