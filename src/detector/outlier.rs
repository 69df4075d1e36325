//! Windowed standard-deviation outlier baseline
//!
//! Each use-case channel keeps a running mean/variance (Welford) over a
//! sliding window; a channel whose standard deviation reaches the
//! threshold flags the sample. Self-diagnostics are ignored unless
//! `include_diagnostics` is set.

use std::collections::VecDeque;

use crate::config::OutlierParams;
use crate::indicators::danger;
use crate::record::{DetectionRecord, SensorRecord};

use super::Detector;

/// Danger lives in [0, 1]; scale it into the reading channels' range.
const DIAGNOSTIC_GAIN: f64 = 10.0;

/// Running mean and variance with optional sliding-window eviction.
#[derive(Debug, Clone)]
pub struct Welford {
    mean: f64,
    m2: f64,
    count: usize,
    window: Option<usize>,
    values: VecDeque<f64>,
}

impl Welford {
    pub fn new(window: Option<usize>) -> Self {
        Self {
            mean: 0.0,
            m2: 0.0,
            count: 0,
            window: window.map(|w| w.max(1)),
            values: VecDeque::new(),
        }
    }

    fn add(&mut self, value: f64) {
        let mean_old = self.mean;
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.m2 += (value - self.mean) * (value - mean_old);
    }

    fn remove(&mut self, value: f64) {
        match self.count {
            0 => {}
            1 => {
                self.mean = 0.0;
                self.m2 = 0.0;
                self.count = 0;
            }
            n => {
                let mean_old = (n as f64 * self.mean - value) / (n - 1) as f64;
                self.m2 -= (value - self.mean) * (value - mean_old);
                self.mean = mean_old;
                self.count -= 1;
            }
        }
    }

    /// Push a value, evicting the oldest one once the window is full.
    pub fn push(&mut self, value: f64) {
        if let Some(window) = self.window {
            self.values.push_back(value);
            if self.count >= window {
                if let Some(old) = self.values.pop_front() {
                    self.remove(old);
                }
            }
        }
        self.add(value);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.m2.abs() / self.count as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}

pub struct OutlierDetector {
    params: OutlierParams,
    readings: [Welford; 4],
    diagnostics: Welford,
}

impl OutlierDetector {
    pub fn new(params: &OutlierParams) -> Self {
        let window = Some(params.window);
        Self {
            params: params.clone(),
            readings: std::array::from_fn(|_| Welford::new(window)),
            diagnostics: Welford::new(window),
        }
    }

    fn flag(&self, channel: &Welford) -> u8 {
        u8::from(channel.std_dev() >= self.params.threshold)
    }
}

impl Detector for OutlierDetector {
    fn name(&self) -> &'static str {
        "outlier"
    }

    fn reset(&mut self) {
        for channel in self.readings.iter_mut() {
            channel.reset();
        }
        self.diagnostics.reset();
    }

    fn step(&mut self, record: &SensorRecord) -> DetectionRecord {
        for (channel, value) in self.readings.iter_mut().zip(record.readings.as_array()) {
            channel.push(value);
        }
        let mut context = self
            .readings
            .iter()
            .map(|c| self.flag(c))
            .max()
            .unwrap_or(0);

        let mut danger_out = 0.0;
        if self.params.include_diagnostics {
            let d = danger(record);
            self.diagnostics.push(d * DIAGNOSTIC_GAIN);
            context = context.max(self.flag(&self.diagnostics));
            danger_out = d;
        }

        let mut sensor = record.clone();
        sensor.indicators = [0.0; 8];

        DetectionRecord {
            sensor,
            antigen: "-".to_string(),
            danger: danger_out,
            safe: 0.0,
            context,
        }
    }
}
