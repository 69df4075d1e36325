//! Danger and safe signals of the dDCA
//!
//! Danger aggregates the node's self-diagnostic fault indicators, safe
//! decays with the short-term variability of the use-case readings.

use std::collections::VecDeque;

use crate::record::{round2, SensorRecord};

/// Sum of all fault indicators, saturated at 1.
pub fn danger(record: &SensorRecord) -> f64 {
    let sum: f64 = record.indicators.iter().sum();
    round2(sum.min(1.0))
}

/// Bounded FIFO of the most recent readings of one channel.
#[derive(Debug, Clone)]
pub struct StdDevWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl StdDevWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            values: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.values.push_back(value);
        if self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Population standard deviation of the current contents.
    pub fn std_dev(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let n = self.values.len() as f64;
        let mu = self.values.iter().sum::<f64>() / n;
        let var = self.values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
        var.sqrt()
    }
}

/// Safe indicator over the four use-case channels.
#[derive(Debug, Clone)]
pub struct SafeSignal {
    channels: [StdDevWindow; 4],
    sensitivity: f64,
}

impl SafeSignal {
    pub fn new(window: usize, sensitivity: f64) -> Self {
        Self {
            channels: std::array::from_fn(|_| StdDevWindow::new(window)),
            sensitivity,
        }
    }

    /// Push the record's readings and return the updated safe value.
    pub fn update(&mut self, record: &SensorRecord) -> f64 {
        let readings = record.readings.as_array();
        for (window, value) in self.channels.iter_mut().zip(readings) {
            window.push(value);
        }
        let worst = self
            .channels
            .iter()
            .map(StdDevWindow::std_dev)
            .fold(0.0_f64, f64::max);
        round2((-worst * self.sensitivity).exp())
    }

    pub fn reset(&mut self) {
        let window = self.channels[0].capacity;
        self.channels = std::array::from_fn(|_| StdDevWindow::new(window));
    }
}
