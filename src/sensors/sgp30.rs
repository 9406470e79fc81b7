/// Sensirion SGP30 eCO2/TVOC sensor over I2C
use log::{debug, info};
use rppal::i2c::I2c;
use std::thread::sleep;
use std::time::Duration;

use crate::error::SensorError;
use crate::models::{Baseline, GasReading};
use crate::sensors::compensation::to_fixed_point;
use crate::sensors::GasSensor;

// SGP30 protocol constants
const SGP30_ADDRESS: u16 = 0x58;
const CRC8_POLYNOMIAL: u8 = 0x31;
const CRC8_INIT: u8 = 0xFF;

/// One SGP30 command: opcode, words returned, and how long to wait before
/// reading the reply.
#[derive(Debug, Clone, Copy)]
struct Command {
    code: [u8; 2],
    reply_words: usize,
    delay: Duration,
}

const GET_SERIAL_ID: Command = Command {
    code: [0x36, 0x82],
    reply_words: 3,
    delay: Duration::from_millis(10),
};
const IAQ_INIT: Command = Command {
    code: [0x20, 0x03],
    reply_words: 0,
    delay: Duration::from_millis(10),
};
const MEASURE_IAQ: Command = Command {
    code: [0x20, 0x08],
    reply_words: 2,
    delay: Duration::from_millis(50),
};
const GET_IAQ_BASELINE: Command = Command {
    code: [0x20, 0x15],
    reply_words: 2,
    delay: Duration::from_millis(10),
};
const SET_IAQ_BASELINE: Command = Command {
    code: [0x20, 0x1e],
    reply_words: 0,
    delay: Duration::from_millis(10),
};
const SET_HUMIDITY: Command = Command {
    code: [0x20, 0x61],
    reply_words: 0,
    delay: Duration::from_millis(10),
};

/// Sensirion CRC-8 (polynomial 0x31, init 0xFF) over a data word
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC8_INIT;
    for byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLYNOMIAL
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Build the write frame for a command: opcode followed by each argument
/// word and its CRC.
fn encode_command(code: [u8; 2], args: &[u16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + args.len() * 3);
    frame.extend_from_slice(&code);
    for word in args {
        let bytes = word.to_be_bytes();
        frame.extend_from_slice(&bytes);
        frame.push(crc8(&bytes));
    }
    frame
}

/// Split a reply into words, checking the CRC after each one
fn decode_words(reply: &[u8]) -> Result<Vec<u16>, SensorError> {
    if reply.len() % 3 != 0 {
        return Err(SensorError::InvalidData(format!(
            "SGP30 reply length {} is not a multiple of 3",
            reply.len()
        )));
    }

    reply
        .chunks_exact(3)
        .map(|chunk| {
            let expected = crc8(&chunk[..2]);
            if expected != chunk[2] {
                return Err(SensorError::Crc {
                    expected,
                    actual: chunk[2],
                });
            }
            Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
        })
        .collect()
}

/// The baseline is written TVOC first, the reverse of how it is read back
fn baseline_args(baseline: Baseline) -> [u16; 2] {
    [baseline.tvoc, baseline.eco2]
}

/// SGP30 driver. The bus is opened lazily by [`GasSensor::init`] so a
/// failed start can be retried.
pub struct Sgp30 {
    bus_number: u8,
    i2c: Option<I2c>,
}

impl Sgp30 {
    pub fn new(bus_number: u8) -> Self {
        Sgp30 {
            bus_number,
            i2c: None,
        }
    }

    fn run(&mut self, command: Command, args: &[u16]) -> Result<Vec<u16>, SensorError> {
        let i2c = self.i2c.as_mut().ok_or(SensorError::NotInitialized)?;

        i2c.write(&encode_command(command.code, args))?;
        sleep(command.delay);

        if command.reply_words == 0 {
            return Ok(Vec::new());
        }

        let mut reply = vec![0u8; command.reply_words * 3];
        i2c.read(&mut reply)?;
        decode_words(&reply)
    }
}

impl GasSensor for Sgp30 {
    fn init(&mut self) -> Result<(), SensorError> {
        if self.i2c.is_none() {
            let mut i2c = I2c::with_bus(self.bus_number)?;
            i2c.set_slave_address(SGP30_ADDRESS)?;
            self.i2c = Some(i2c);
        }

        let result = self.run(GET_SERIAL_ID, &[]).and_then(|serial| {
            info!(
                "SGP30 serial: #{}",
                serial
                    .iter()
                    .map(|word| format!("{:04x}", word))
                    .collect::<String>()
            );
            self.run(IAQ_INIT, &[])
        });

        if result.is_err() {
            // Force the bus to be reopened next time
            self.i2c = None;
        }
        result.map(|_| ())
    }

    fn set_baseline(&mut self, baseline: Baseline) -> Result<(), SensorError> {
        if baseline.eco2 == 0 && baseline.tvoc == 0 {
            return Err(SensorError::InvalidData("baseline of 0/0 is invalid".into()));
        }
        debug!(
            "Set baseline: eCO2 = 0x{:x}, TVOC = 0x{:x}",
            baseline.eco2, baseline.tvoc
        );
        self.run(SET_IAQ_BASELINE, &baseline_args(baseline))
            .map(|_| ())
    }

    fn set_absolute_humidity(&mut self, grams_per_m3: f64) -> Result<(), SensorError> {
        self.run(SET_HUMIDITY, &[to_fixed_point(grams_per_m3)])
            .map(|_| ())
    }

    fn measure(&mut self) -> Result<GasReading, SensorError> {
        let words = self.run(MEASURE_IAQ, &[])?;
        Ok(GasReading {
            eco2: words[0],
            tvoc: words[1],
        })
    }

    fn baseline(&mut self) -> Result<Baseline, SensorError> {
        let words = self.run(GET_IAQ_BASELINE, &[])?;
        Ok(Baseline {
            eco2: words[0],
            tvoc: words[1],
        })
    }
}
