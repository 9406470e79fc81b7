/// DHT11 temperature/humidity sensor on a single GPIO data line
use log::debug;
use rppal::gpio::{Bias, Gpio, IoPin, Level, Mode};
use std::thread::sleep;
use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::models::ClimateReading;
use crate::sensors::ClimateSensor;

// DHT11 timing (datasheet): host start >= 18 ms low, '0' bit ~27 us high,
// '1' bit ~70 us high
const START_SIGNAL: Duration = Duration::from_millis(18);
const BIT_THRESHOLD: Duration = Duration::from_micros(40);
const LEVEL_TIMEOUT: Duration = Duration::from_micros(200);
const FRAME_BITS: usize = 40;

// Same policy as the vendor driver's read_retry: 15 tries, 2 s apart
const DEFAULT_ATTEMPTS: u32 = 15;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Turn the 40 measured high-pulse widths into the 5-byte frame
pub fn bits_to_frame(high_pulses: &[Duration]) -> Result<[u8; 5], SensorError> {
    if high_pulses.len() != FRAME_BITS {
        return Err(SensorError::InvalidData(format!(
            "expected {} bits, got {}",
            FRAME_BITS,
            high_pulses.len()
        )));
    }

    let mut frame = [0u8; 5];
    for (i, width) in high_pulses.iter().enumerate() {
        if *width > BIT_THRESHOLD {
            frame[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    Ok(frame)
}

/// Decode a DHT11 frame: humidity integer/decimal, temperature
/// integer/decimal (bit 7 of the decimal byte is the sign), checksum.
pub fn decode_frame(frame: [u8; 5]) -> Result<ClimateReading, SensorError> {
    let checksum = frame[..4]
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    if checksum != frame[4] {
        return Err(SensorError::Checksum);
    }

    let humidity = frame[0] as f32 + frame[1] as f32 * 0.1;
    if humidity > 100.0 {
        return Err(SensorError::InvalidData(format!(
            "humidity {:.1}% out of range",
            humidity
        )));
    }

    let mut temperature = frame[2] as f32 + (frame[3] & 0x0F) as f32 * 0.1;
    if frame[3] & 0x80 != 0 {
        temperature = -temperature;
    }

    Ok(ClimateReading {
        temperature,
        humidity,
    })
}

/// Busy-wait while the line sits at `level`, returning how long it stayed there
fn wait_while(pin: &IoPin, level: Level, stage: &'static str) -> Result<Duration, SensorError> {
    let start = Instant::now();
    while pin.read() == level {
        if start.elapsed() > LEVEL_TIMEOUT {
            return Err(SensorError::Timeout(stage));
        }
    }
    Ok(start.elapsed())
}

pub struct Dht11 {
    pin: u8,
    attempts: u32,
    retry_delay: Duration,
}

impl Dht11 {
    pub fn new(pin: u8) -> Self {
        Dht11 {
            pin,
            attempts: DEFAULT_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    fn read_once(&self) -> Result<ClimateReading, SensorError> {
        let mut pin = Gpio::new()?.get(self.pin)?.into_io(Mode::Output);

        // Start signal, then hand the line back to the sensor
        pin.set_low();
        sleep(START_SIGNAL);
        pin.set_bias(Bias::PullUp);
        pin.set_mode(Mode::Input);

        // Response: line still high, then ~80 us low, ~80 us high
        wait_while(&pin, Level::High, "waiting for response")?;
        wait_while(&pin, Level::Low, "response low phase")?;
        wait_while(&pin, Level::High, "response high phase")?;

        let mut pulses = Vec::with_capacity(FRAME_BITS);
        for _ in 0..FRAME_BITS {
            wait_while(&pin, Level::Low, "bit low phase")?;
            pulses.push(wait_while(&pin, Level::High, "bit high phase")?);
        }

        decode_frame(bits_to_frame(&pulses)?)
    }
}

impl ClimateSensor for Dht11 {
    fn read(&mut self) -> Result<ClimateReading, SensorError> {
        let mut last_error = SensorError::Timeout("no read attempted");

        for attempt in 1..=self.attempts {
            match self.read_once() {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    debug!("DHT11 read attempt {} failed: {}", attempt, e);
                    last_error = e;
                }
            }

            if attempt < self.attempts {
                sleep(self.retry_delay);
            }
        }

        Err(last_error)
    }
}
