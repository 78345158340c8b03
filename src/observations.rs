/// Conversion of decoded readings into observation events
use crate::calibration::apply_calibration;
use crate::models::{DecodedMessage, DeviceRecord, Observation, ObservationResult, Pollutant};
use crate::utils::{format_iso_datetime, round_to};

pub const CALIBRATION_PROCEDURE: &str = "arduino-pm-calibration-correction-v2";
pub const UNCORRECTED_FLAG: &str = "raw";

const SENSOR_PREFIX: &str = "arduino-pm";
const AGGREGATION: &str = "instant";
const PM_UNIT: &str = "microgram-per-cubic-metre";

/// Physical sensors fitted to the board
#[derive(Debug, Clone, Copy)]
enum Subsensor {
    Sht85,
    Pms5003,
    Basestation,
}

impl Subsensor {
    fn as_str(self) -> &'static str {
        match self {
            Subsensor::Sht85 => "sht85",
            Subsensor::Pms5003 => "pms5003",
            Subsensor::Basestation => "basestation",
        }
    }
}

/// Build the observations for one decoded message, in publishing order
///
/// Temperature and humidity come first, then each particulate channel. When
/// the device has a calibration for a channel and humidity was measured, the
/// corrected observation is emitted before the raw one, which is flagged.
/// Signal strength comes last and only when non-zero.
pub fn decoded_message_to_observations(
    decoded: &DecodedMessage,
    device: Option<&DeviceRecord>,
) -> Vec<Observation> {
    let builder = ObservationBuilder {
        device: decoded.device.to_lowercase(),
        result_time: format_iso_datetime(&decoded.time),
    };
    let data = &decoded.data;
    let mut observations = Vec::new();

    if let Some(temp) = data.temp {
        observations.push(builder.observation(
            Subsensor::Sht85,
            "air-temperature",
            "degree-celsius",
            temp,
        ));
    }

    if let Some(humid) = data.humid {
        observations.push(builder.observation(
            Subsensor::Sht85,
            "relative-humidity",
            "percent",
            humid,
        ));
    }

    for pollutant in Pollutant::ALL {
        let Some(value) = data.pollutant(pollutant) else {
            continue;
        };
        let property = pollutant.observed_property();
        let mut raw = builder.observation(Subsensor::Pms5003, property, PM_UNIT, value);

        let calibration = device.and_then(|d| d.calibration(pollutant));
        if let (Some(calibration), Some(humid)) = (calibration, data.humid) {
            let corrected_value = round_to(apply_calibration(value, humid, calibration), 2);
            let mut corrected =
                builder.observation(Subsensor::Pms5003, property, PM_UNIT, corrected_value);
            corrected.used_procedures = Some(vec![CALIBRATION_PROCEDURE.to_string()]);
            observations.push(corrected);

            raw.has_result.flags = Some(vec![UNCORRECTED_FLAG.to_string()]);
        }

        observations.push(raw);
    }

    // A reading of exactly 0 dBm is treated as absent
    if let Some(rssi) = decoded.rssi.filter(|r| *r != 0.0 && !r.is_nan()) {
        observations.push(builder.observation(
            Subsensor::Basestation,
            "received-signal-strength-indicator",
            "decibel",
            rssi,
        ));
    }

    observations
}

struct ObservationBuilder {
    device: String,
    result_time: String,
}

impl ObservationBuilder {
    fn observation(
        &self,
        subsensor: Subsensor,
        property: &str,
        unit: &str,
        value: f64,
    ) -> Observation {
        Observation {
            result_time: self.result_time.clone(),
            has_result: ObservationResult {
                value,
                unit: unit.to_string(),
                flags: None,
            },
            made_by_sensor: format!("{}-{}-{}", SENSOR_PREFIX, self.device, subsensor.as_str()),
            observed_property: property.to_string(),
            aggregation: AGGREGATION.to_string(),
            used_procedures: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Calibration, Coefficients, MessageData};
    use serde_json::json;
    use time::macros::datetime;

    const RESULT_TIME: &str = "2018-08-28T10:18:12.000Z";

    fn decoded(device: &str, rssi: Option<f64>) -> DecodedMessage {
        DecodedMessage {
            device: device.to_string(),
            time: datetime!(2018-08-28 10:18:12 UTC),
            rssi,
            data: MessageData {
                temp: Some(20.0),
                humid: Some(57.0),
                pm1: Some(5.0),
                pm2p5: Some(6.0),
                pm10: Some(7.0),
            },
        }
    }

    fn cal(lt85: (f64, f64), gte85: (f64, f64)) -> Calibration {
        Calibration {
            lt85: Coefficients {
                m: lt85.0,
                c: lt85.1,
            },
            gte85: Coefficients {
                m: gte85.0,
                c: gte85.1,
            },
        }
    }

    fn calibrated_device() -> DeviceRecord {
        let mut device = DeviceRecord::new("123abc");
        device.last_message_at = Some(datetime!(2020-09-21 17:07:33.826 UTC));
        device.pm1 = Some(cal((1.1, 0.1), (1.1, 0.2)));
        device.pm2p5 = Some(cal((0.9, -0.1), (0.98, -0.1)));
        device.pm10 = Some(cal((1.2, -0.3), (1.01, 0.0)));
        device
    }

    fn expected(value: serde_json::Value) -> Vec<Observation> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn builds_observations_without_calibration() {
        let observations = decoded_message_to_observations(&decoded("123abc", Some(-101.0)), None);

        assert_eq!(
            observations,
            expected(json!([
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": 20.0, "unit": "degree-celsius"},
                    "madeBySensor": "arduino-pm-123abc-sht85",
                    "observedProperty": "air-temperature",
                    "aggregation": "instant"
                },
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": 57.0, "unit": "percent"},
                    "madeBySensor": "arduino-pm-123abc-sht85",
                    "observedProperty": "relative-humidity",
                    "aggregation": "instant"
                },
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": 5.0, "unit": "microgram-per-cubic-metre"},
                    "madeBySensor": "arduino-pm-123abc-pms5003",
                    "observedProperty": "pm1-mass-concentration",
                    "aggregation": "instant"
                },
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": 6.0, "unit": "microgram-per-cubic-metre"},
                    "madeBySensor": "arduino-pm-123abc-pms5003",
                    "observedProperty": "pm2p5-mass-concentration",
                    "aggregation": "instant"
                },
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": 7.0, "unit": "microgram-per-cubic-metre"},
                    "madeBySensor": "arduino-pm-123abc-pms5003",
                    "observedProperty": "pm10-mass-concentration",
                    "aggregation": "instant"
                },
                {
                    "resultTime": RESULT_TIME,
                    "hasResult": {"value": -101.0, "unit": "decibel"},
                    "madeBySensor": "arduino-pm-123abc-basestation",
                    "observedProperty": "received-signal-strength-indicator",
                    "aggregation": "instant"
                }
            ]))
        );
    }

    #[test]
    fn builds_corrected_and_raw_pairs_with_calibration() {
        let device = calibrated_device();
        let observations =
            decoded_message_to_observations(&decoded("123abc", Some(-101.0)), Some(&device));

        let pm = |value: f64, property: &str, corrected: bool| {
            let mut obs = json!({
                "resultTime": RESULT_TIME,
                "hasResult": {"value": value, "unit": "microgram-per-cubic-metre"},
                "madeBySensor": "arduino-pm-123abc-pms5003",
                "observedProperty": property,
                "aggregation": "instant"
            });
            if corrected {
                obs["usedProcedures"] = json!([CALIBRATION_PROCEDURE]);
            } else {
                obs["hasResult"]["flags"] = json!([UNCORRECTED_FLAG]);
            }
            obs
        };

        assert_eq!(observations.len(), 9);
        assert_eq!(observations[0].observed_property, "air-temperature");
        assert_eq!(observations[1].observed_property, "relative-humidity");
        assert_eq!(
            observations[2..8].to_vec(),
            expected(json!([
                pm(4.45, "pm1-mass-concentration", true),
                pm(5.0, "pm1-mass-concentration", false),
                pm(6.78, "pm2p5-mass-concentration", true),
                pm(6.0, "pm2p5-mass-concentration", false),
                pm(6.08, "pm10-mass-concentration", true),
                pm(7.0, "pm10-mass-concentration", false),
            ]))
        );
        assert_eq!(observations[8].made_by_sensor, "arduino-pm-123abc-basestation");
    }

    #[test]
    fn corrected_and_raw_observations_are_tagged_exclusively() {
        let device = calibrated_device();
        let observations =
            decoded_message_to_observations(&decoded("123abc", None), Some(&device));

        for obs in observations.iter().filter(|o| o.has_result.unit == PM_UNIT) {
            match (&obs.used_procedures, &obs.has_result.flags) {
                (Some(procedures), None) => assert_eq!(procedures, &[CALIBRATION_PROCEDURE]),
                (None, Some(flags)) => assert_eq!(flags, &[UNCORRECTED_FLAG]),
                other => panic!("unexpected tagging {:?}", other),
            }
        }
    }

    #[test]
    fn counts_follow_rssi_and_calibration() {
        assert_eq!(
            decoded_message_to_observations(&decoded("123abc", Some(-101.0)), None).len(),
            6
        );
        assert_eq!(
            decoded_message_to_observations(&decoded("123abc", None), None).len(),
            5
        );
        assert_eq!(
            decoded_message_to_observations(&decoded("123abc", Some(0.0)), None).len(),
            5
        );
        assert_eq!(
            decoded_message_to_observations(&decoded("123abc", None), Some(&calibrated_device()))
                .len(),
            8
        );
    }

    #[test]
    fn only_calibrated_channels_get_pairs() {
        let mut device = DeviceRecord::new("123abc");
        device.pm2p5 = Some(cal((1.0, 0.0), (1.0, 0.0)));
        let observations =
            decoded_message_to_observations(&decoded("123abc", None), Some(&device));

        assert_eq!(observations.len(), 6);
        assert_eq!(observations[2].has_result.flags, None);
        assert!(observations[3].used_procedures.is_some());
        assert_eq!(observations[4].has_result.flags, Some(vec!["raw".to_string()]));
        assert_eq!(observations[5].has_result.flags, None);
    }

    #[test]
    fn no_correction_without_humidity() {
        let mut message = decoded("123abc", None);
        message.data.humid = None;
        let observations =
            decoded_message_to_observations(&message, Some(&calibrated_device()));

        assert_eq!(observations.len(), 4);
        assert!(observations
            .iter()
            .all(|o| o.used_procedures.is_none() && o.has_result.flags.is_none()));
    }

    #[test]
    fn sensor_ids_are_lowercase() {
        let upper = decoded_message_to_observations(&decoded("123ABC", Some(-90.0)), None);
        let lower = decoded_message_to_observations(&decoded("123abc", Some(-90.0)), None);
        assert_eq!(upper, lower);
    }
}
