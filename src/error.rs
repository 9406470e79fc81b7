/// Error kinds for every stage of the sampling and reporting loop
use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or writing the persisted configuration record
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not serialize config: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("config file {0} does not match the record just written")]
    Verification(PathBuf),
}

/// Failures talking to the SGP30 or the DHT11
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("CRC mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    Crc { expected: u8, actual: u8 },

    #[error("checksum mismatch in DHT11 frame")]
    Checksum,

    #[error("sensor timeout: {0}")]
    Timeout(&'static str),

    #[error("invalid sensor data: {0}")]
    InvalidData(String),

    #[error("gas sensor is not initialized")]
    NotInitialized,

    #[error("sensor worker failed: {0}")]
    Worker(String),
}

/// Transport-level failures. Every variant is eligible for retry.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Reasons a reporting cycle produced no accepted push
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid API url '{url}': {source}")]
    Endpoint {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("could not format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("giving up after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("request not successful ({status}): {body}")]
    Rejected { status: u16, body: String },
}
