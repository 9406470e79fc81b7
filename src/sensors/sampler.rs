/// Compensated sampling across the gas and climate sensors
use log::{debug, error, info};

use crate::error::SensorError;
use crate::models::{Baseline, Calibration, Sample};
use crate::sensors::compensation::absolute_humidity;
use crate::sensors::{ClimateSensor, GasSensor};

pub struct Sampler {
    gas: Box<dyn GasSensor>,
    climate: Box<dyn ClimateSensor>,
    baseline: Baseline,
    ready: bool,
}

impl Sampler {
    pub fn new(gas: Box<dyn GasSensor>, climate: Box<dyn ClimateSensor>, baseline: Baseline) -> Self {
        Sampler {
            gas,
            climate,
            baseline,
            ready: false,
        }
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Initialize the gas sensor and program the starting baseline
    ///
    /// A failure leaves the sampler degraded; the next [`Sampler::sample`]
    /// retries initialization with the last-known baseline.
    pub fn initialize(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        self.baseline = baseline;
        self.ready = false;

        let result = self
            .gas
            .init()
            .and_then(|_| self.gas.set_baseline(baseline));

        match &result {
            Ok(()) => {
                info!(
                    "Gas sensor initialized with baseline eCO2 = 0x{:x}, TVOC = 0x{:x}",
                    baseline.eco2, baseline.tvoc
                );
                self.ready = true;
            }
            Err(e) => error!("SGP30 init error: {}", e),
        }

        result
    }

    /// Take one compensated reading
    pub fn sample(&mut self, calibration: &Calibration) -> Result<Sample, SensorError> {
        if !self.ready {
            self.initialize(self.baseline)?;
        }

        let raw = self.climate.read()?;
        let humidity = raw.humidity + calibration.humidity_offset as f32;
        let temperature = raw.temperature + calibration.temperature_offset as f32;

        let a_humidity = absolute_humidity(humidity as f64, temperature as f64);
        self.gas.set_absolute_humidity(a_humidity)?;

        let gas = self.gas.measure()?;

        let sample = Sample {
            eco2: gas.eco2,
            tvoc: gas.tvoc,
            temperature,
            humidity,
            absolute_humidity: a_humidity,
        };

        info!(
            "Values: eCO2 = {} ppm, TVOC = {} ppb, temperature = {:.1} °C, humidity = {:.1} %, absolute humidity = {:.3} g/m³",
            sample.eco2, sample.tvoc, sample.temperature, sample.humidity, sample.absolute_humidity
        );

        Ok(sample)
    }

    /// Read back the baseline the sensor has learned since start-up
    pub fn current_baseline(&mut self) -> Result<Baseline, SensorError> {
        if !self.ready {
            return Err(SensorError::NotInitialized);
        }

        let baseline = self.gas.baseline()?;
        debug!(
            "Baseline: eCO2 = 0x{:x}, TVOC = 0x{:x}",
            baseline.eco2, baseline.tvoc
        );
        self.baseline = baseline;
        Ok(baseline)
    }
}
