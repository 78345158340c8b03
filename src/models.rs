use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::CalibrationError;
use crate::utils::iso_datetime_option;

/// Sigfox callback body after validation
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub device: String,
    pub data: String,
    /// Seconds since the epoch
    pub time: f64,
    pub rssi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Lowercased Sigfox device id
    pub device: String,
    pub time: OffsetDateTime,
    pub rssi: Option<f64>,
    pub data: MessageData,
}

/// Readings carried by one payload. The decoder always fills every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humid: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm2p5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pm10: Option<f64>,
}

impl MessageData {
    pub fn pollutant(&self, pollutant: Pollutant) -> Option<f64> {
        match pollutant {
            Pollutant::Pm1 => self.pm1,
            Pollutant::Pm2p5 => self.pm2p5,
            Pollutant::Pm10 => self.pm10,
        }
    }
}

/// Particulate channels measured by the PMS5003, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pollutant {
    Pm1,
    Pm2p5,
    Pm10,
}

impl Pollutant {
    pub const ALL: [Pollutant; 3] = [Pollutant::Pm1, Pollutant::Pm2p5, Pollutant::Pm10];

    /// Key used in device records and update bodies
    pub fn key(self) -> &'static str {
        match self {
            Pollutant::Pm1 => "pm1",
            Pollutant::Pm2p5 => "pm2p5",
            Pollutant::Pm10 => "pm10",
        }
    }

    pub fn observed_property(self) -> &'static str {
        match self {
            Pollutant::Pm1 => "pm1-mass-concentration",
            Pollutant::Pm2p5 => "pm2p5-mass-concentration",
            Pollutant::Pm10 => "pm10-mass-concentration",
        }
    }
}

/// Linear correction, i.e. "measured = m * actual + c"
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Coefficients {
    pub m: f64,
    pub c: f64,
}

/// Correction coefficients split on the 85% relative humidity threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Calibration {
    pub lt85: Coefficients,
    pub gte85: Coefficients,
}

impl Calibration {
    /// Parse a calibration object, rejecting partial coefficient sets and a zero slope
    pub fn from_value(field: &str, value: &Value) -> Result<Self, CalibrationError> {
        let invalid = |reason: String| CalibrationError {
            field: field.to_string(),
            reason,
        };

        let calibration: Calibration =
            serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))?;

        for (band, coefficients) in [("lt85", calibration.lt85), ("gte85", calibration.gte85)] {
            if coefficients.m == 0.0 {
                return Err(invalid(format!("{band}.m must not be 0")));
            }
            if !coefficients.m.is_finite() || !coefficients.c.is_finite() {
                return Err(invalid(format!("{band} coefficients must be finite")));
            }
        }

        Ok(calibration)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "iso_datetime_option"
    )]
    pub last_message_at: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm1: Option<Calibration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm2p5: Option<Calibration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pm10: Option<Calibration>,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>) -> Self {
        DeviceRecord {
            id: id.into(),
            last_message_at: None,
            pm1: None,
            pm2p5: None,
            pm10: None,
        }
    }

    pub fn calibration(&self, pollutant: Pollutant) -> Option<&Calibration> {
        match pollutant {
            Pollutant::Pm1 => self.pm1.as_ref(),
            Pollutant::Pm2p5 => self.pm2p5.as_ref(),
            Pollutant::Pm10 => self.pm10.as_ref(),
        }
    }

    pub fn apply(&mut self, update: &DeviceUpdate) {
        if let Some(at) = update.last_message_at {
            self.last_message_at = Some(at);
        }
        update.pm1.apply_to(&mut self.pm1);
        update.pm2p5.apply_to(&mut self.pm2p5);
        update.pm10.apply_to(&mut self.pm10);
    }
}

/// What an upsert does to one optional field
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Unchanged,
    Set(T),
    Cleared,
}

impl<T: Clone> FieldUpdate<T> {
    /// Absent key leaves the field alone, `null` clears it
    pub fn from_body<E>(
        value: Option<&Value>,
        parse: impl FnOnce(&Value) -> Result<T, E>,
    ) -> Result<Self, E> {
        match value {
            None => Ok(FieldUpdate::Unchanged),
            Some(Value::Null) => Ok(FieldUpdate::Cleared),
            Some(v) => parse(v).map(FieldUpdate::Set),
        }
    }

    pub fn apply_to(&self, target: &mut Option<T>) {
        match self {
            FieldUpdate::Unchanged => {}
            FieldUpdate::Set(value) => *target = Some(value.clone()),
            FieldUpdate::Cleared => *target = None,
        }
    }

    pub fn touches(&self) -> bool {
        !matches!(self, FieldUpdate::Unchanged)
    }

    pub fn new_value(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(value) => Some(value),
            _ => None,
        }
    }
}

/// Partial update handed to the device store
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeviceUpdate {
    pub last_message_at: Option<OffsetDateTime>,
    pub pm1: FieldUpdate<Calibration>,
    pub pm2p5: FieldUpdate<Calibration>,
    pub pm10: FieldUpdate<Calibration>,
}

impl DeviceUpdate {
    pub fn last_message(at: OffsetDateTime) -> Self {
        DeviceUpdate {
            last_message_at: Some(at),
            ..Default::default()
        }
    }

    pub fn calibration_mut(&mut self, pollutant: Pollutant) -> &mut FieldUpdate<Calibration> {
        match pollutant {
            Pollutant::Pm1 => &mut self.pm1,
            Pollutant::Pm2p5 => &mut self.pm2p5,
            Pollutant::Pm10 => &mut self.pm10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub result_time: String,
    pub has_result: ObservationResult,
    pub made_by_sensor: String,
    pub observed_property: String,
    pub aggregation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_procedures: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResult {
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
}
