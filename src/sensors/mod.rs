pub mod compensation;
pub mod dht11;
pub mod sampler;
pub mod sgp30;

#[cfg(test)]
pub mod mock;

pub use dht11::Dht11;
pub use sampler::Sampler;
pub use sgp30::Sgp30;

use crate::error::SensorError;
use crate::models::{Baseline, ClimateReading, GasReading};

/// eCO2/TVOC sensor with an internal calibration baseline
pub trait GasSensor: Send {
    /// Open the bus and run the sensor's own init sequence
    fn init(&mut self) -> Result<(), SensorError>;
    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError>;
    /// Feed absolute humidity (g/m³) in for compensation
    fn set_absolute_humidity(&mut self, grams_per_m3: f64) -> Result<(), SensorError>;
    fn measure(&mut self) -> Result<GasReading, SensorError>;
    /// Read the live baseline back from the device
    fn baseline(&mut self) -> Result<Baseline, SensorError>;
}

/// Temperature/humidity sensor. `read` may block while the driver retries.
pub trait ClimateSensor: Send {
    fn read(&mut self) -> Result<ClimateReading, SensorError>;
}
