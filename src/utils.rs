/// Utility functions for number rounding and timestamp formatting
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Round to a number of decimal places the way the sensor's reference tooling does
///
/// The value is shifted by a decimal exponent through its shortest string form
/// before rounding, so 1.005 becomes 1.01 rather than suffering from its binary
/// representation. Ties round toward positive infinity.
pub fn round_to(value: f64, precision: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let shifted: f64 = format!("{}e{}", value, precision)
        .parse()
        .unwrap_or_else(|_| value * 10f64.powi(precision));
    let rounded = round_half_up(shifted);
    format!("{}e{}", rounded, -precision)
        .parse()
        .unwrap_or_else(|_| rounded / 10f64.powi(precision))
}

fn round_half_up(value: f64) -> f64 {
    let rounded = value.round();
    // f64::round moves negative ties away from zero
    if rounded - value == -0.5 {
        rounded + 1.0
    } else {
        rounded
    }
}

/// Format a timestamp as ISO-8601 in UTC with millisecond precision
///
/// e.g. 2018-08-28T10:18:12.000Z. Falls back to the default string
/// representation if formatting fails.
pub fn format_iso_datetime(dt: &OffsetDateTime) -> String {
    let format =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");
    let utc = dt.to_offset(UtcOffset::UTC);
    utc.format(&format).unwrap_or_else(|_| utc.to_string())
}

/// Serde helpers for optional timestamps stored as ISO-8601 strings
pub mod iso_datetime_option {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    use super::format_iso_datetime;

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&format_iso_datetime(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| OffsetDateTime::parse(&s, &Rfc3339).map_err(serde::de::Error::custom))
            .transpose()
    }
}
