/// In-memory sensors for exercising the sampler and scheduler
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::SensorError;
use crate::models::{Baseline, ClimateReading, GasReading};
use crate::sensors::{ClimateSensor, GasSensor};

#[derive(Debug, Default)]
pub struct GasState {
    pub fail_init: bool,
    pub fail_measure: bool,
    pub fail_baseline: bool,
    pub reading: Option<GasReading>,
    pub baseline: Option<Baseline>,
    pub humidity: Vec<f64>,
    pub init_calls: usize,
    pub measure_calls: usize,
    pub baseline_reads: usize,
}

#[derive(Clone, Default)]
pub struct MockGas {
    pub state: Arc<Mutex<GasState>>,
}

impl MockGas {
    pub fn new(reading: GasReading) -> Self {
        let gas = MockGas::default();
        gas.state.lock().unwrap().reading = Some(reading);
        gas
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut GasState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

impl GasSensor for MockGas {
    fn init(&mut self) -> Result<(), SensorError> {
        self.with(|s| {
            s.init_calls += 1;
            if s.fail_init {
                Err(SensorError::Timeout("mock init"))
            } else {
                Ok(())
            }
        })
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        self.with(|s| s.baseline = Some(baseline));
        Ok(())
    }

    fn set_absolute_humidity(&mut self, grams_per_m3: f64) -> Result<(), SensorError> {
        self.with(|s| s.humidity.push(grams_per_m3));
        Ok(())
    }

    fn measure(&mut self) -> Result<GasReading, SensorError> {
        self.with(|s| {
            s.measure_calls += 1;
            match (s.fail_measure, s.reading) {
                (false, Some(reading)) => Ok(reading),
                _ => Err(SensorError::Timeout("mock measure")),
            }
        })
    }

    fn baseline(&mut self) -> Result<Baseline, SensorError> {
        self.with(|s| {
            s.baseline_reads += 1;
            match (s.fail_baseline, s.baseline) {
                (false, Some(baseline)) => Ok(baseline),
                _ => Err(SensorError::NotInitialized),
            }
        })
    }
}

#[derive(Debug, Default)]
pub struct ClimateState {
    pub fail: bool,
    /// Simulated blocking read time
    pub delay: Duration,
    pub reading: Option<ClimateReading>,
    pub reads: usize,
}

#[derive(Clone, Default)]
pub struct MockClimate {
    pub state: Arc<Mutex<ClimateState>>,
}

impl MockClimate {
    pub fn new(reading: ClimateReading) -> Self {
        let climate = MockClimate::default();
        climate.state.lock().unwrap().reading = Some(reading);
        climate
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ClimateState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

impl ClimateSensor for MockClimate {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let delay = self.with(|s| s.delay);
        std::thread::sleep(delay);
        self.with(|s| {
            s.reads += 1;
            match (s.fail, s.reading) {
                (false, Some(reading)) => Ok(reading),
                _ => Err(SensorError::Checksum),
            }
        })
    }
}
