use crate::models::{Sample, WindowMedians};
use crate::utils::median;

/// Readings buffered since the last report
///
/// The three sequences always have the same length; one entry is appended
/// to each per successful sample.
#[derive(Debug, Default)]
pub struct Window {
    eco2: Vec<f64>,
    temperature: Vec<f64>,
    humidity: Vec<f64>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sample: &Sample) {
        self.eco2.push(sample.eco2 as f64);
        self.temperature.push(sample.temperature as f64);
        self.humidity.push(sample.humidity as f64);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.eco2.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.eco2.is_empty()
    }

    /// Drain the window and return the median of each metric, or None if
    /// nothing was sampled since the last flush
    pub fn flush_median(&mut self) -> Option<WindowMedians> {
        let eco2 = std::mem::take(&mut self.eco2);
        let temperature = std::mem::take(&mut self.temperature);
        let humidity = std::mem::take(&mut self.humidity);

        Some(WindowMedians {
            eco2: median(&eco2)?,
            humidity: median(&humidity)?,
            temperature: median(&temperature)?,
            samples: eco2.len(),
        })
    }
}
