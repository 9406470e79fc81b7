//! Humidity compensation for the SGP30 gas sensor

/// Convert relative humidity (%) and temperature (°C) to absolute humidity
/// in g/m³ using the Magnus approximation of saturation vapour pressure.
pub fn absolute_humidity(rel_humidity_pct: f64, temp_c: f64) -> f64 {
    let saturation = 6.112 * ((17.62 * temp_c) / (243.12 + temp_c)).exp();
    216.7 * (((rel_humidity_pct / 100.0) * saturation) / (273.15 + temp_c))
}

/// Encode absolute humidity as the SGP30's 8.8 fixed-point humidity word
///
/// Values outside the representable range are clamped; NaN encodes as zero,
/// which the sensor treats as "compensation off".
pub fn to_fixed_point(grams_per_m3: f64) -> u16 {
    let scaled = (grams_per_m3 * 256.0).floor();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else if scaled >= u16::MAX as f64 {
        u16::MAX
    } else {
        scaled as u16
    }
}
