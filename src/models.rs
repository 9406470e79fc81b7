use serde::Serialize;

/// SGP30 calibration state, persisted across power cycles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Baseline {
    pub eco2: u16,
    pub tvoc: u16,
}

/// Static shared-secret identity sent as request headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub id: String,
    pub secret: String,
}

/// Offsets added to the raw DHT11 reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Calibration {
    pub temperature_offset: i32,
    pub humidity_offset: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    pub temperature: f32,
    pub humidity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasReading {
    pub eco2: u16,
    pub tvoc: u16,
}

/// One compensated measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub eco2: u16,
    pub tvoc: u16,
    pub temperature: f32,
    pub humidity: f32,
    pub absolute_humidity: f64,
}

/// Medians of a drained aggregation window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowMedians {
    pub eco2: f64,
    pub humidity: f64,
    pub temperature: f64,
    pub samples: usize,
}

/// JSON body for `POST /api/airQuality`
#[derive(Debug, Clone, Serialize)]
pub struct AirQualityReport {
    #[serde(rename = "eCO2")]
    pub eco2: f64,
    pub humidity: f64,
    pub temperature: f64,
    #[serde(rename = "dateTimeUTC")]
    pub date_time_utc: String,
}
