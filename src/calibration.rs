use crate::models::Calibration;

/// Relative humidity (%) at and above which the high-humidity coefficients apply
pub const HUMIDITY_THRESHOLD: f64 = 85.0;

/// Correct a particulate reading with the coefficients for the current humidity
///
/// Inverts "measured = m * actual + c". A zero slope is never stored, see
/// `Calibration::from_value`.
pub fn apply_calibration(uncorrected: f64, humidity: f64, calibration: &Calibration) -> f64 {
    let coefficients = if humidity < HUMIDITY_THRESHOLD {
        &calibration.lt85
    } else {
        &calibration.gte85
    };
    (uncorrected - coefficients.c) / coefficients.m
}
