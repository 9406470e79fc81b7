/// Utility functions for data processing and formatting
use time::macros::format_description;
use time::OffsetDateTime;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(format).unwrap_or_else(|_| dt.to_string())
}

/// Format a UTC timestamp for the API body
///
/// ISO-8601 with microseconds and no offset suffix, e.g.
/// `2024-03-01T12:30:05.123456`. The value is converted to UTC first.
pub fn format_timestamp_utc(dt: OffsetDateTime) -> Result<String, time::error::Format> {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]");
    dt.to_offset(time::UtcOffset::UTC).format(format)
}

/// Median of a set of values
///
/// Middle element for an odd count, mean of the two middle elements for an
/// even count. Returns None for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}
