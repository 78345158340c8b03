/// Validation and normalization of Sigfox callback bodies
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::decoder::payload::decode_arduino_pm_hex;
use crate::error::IngestError;
use crate::models::{DecodedMessage, RawMessage};

const KNOWN_FIELDS: [&str; 4] = ["device", "data", "time", "rssi"];

/// Check a callback body and pull out its fields
///
/// `device` and `data` must be non-empty strings, `time` a number and `rssi`,
/// when present, a number or null. Every problem is reported in one error.
pub fn validate_message(body: &Value) -> Result<RawMessage, IngestError> {
    let object = body.as_object().ok_or_else(|| {
        IngestError::Validation("Invalid message: body must be a JSON object".to_string())
    })?;

    let mut problems = Vec::new();

    let device = required_string(object, "device", &mut problems);
    let data = required_string(object, "data", &mut problems);

    let time = match object.get("time") {
        None | Some(Value::Null) => {
            problems.push("\"time\" is required".to_string());
            None
        }
        Some(value) => {
            let time = value.as_f64();
            if time.is_none() {
                problems.push("\"time\" must be a number".to_string());
            }
            time
        }
    };

    let rssi = match object.get("rssi") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let rssi = value.as_f64();
            if rssi.is_none() {
                problems.push("\"rssi\" must be a number".to_string());
            }
            rssi
        }
    };

    for key in object.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            problems.push(format!("\"{}\" is not allowed", key));
        }
    }

    match (device, data, time) {
        (Some(device), Some(data), Some(time)) if problems.is_empty() => Ok(RawMessage {
            device,
            data,
            time,
            rssi,
        }),
        _ => Err(IngestError::Validation(format!(
            "Invalid message: {}",
            problems.join("; ")
        ))),
    }
}

fn required_string(
    object: &Map<String, Value>,
    key: &str,
    problems: &mut Vec<String>,
) -> Option<String> {
    match object.get(key) {
        None => {
            problems.push(format!("\"{}\" is required", key));
            None
        }
        Some(Value::String(s)) if s.is_empty() => {
            problems.push(format!("\"{}\" is not allowed to be empty", key));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            problems.push(format!("\"{}\" must be a string", key));
            None
        }
    }
}

/// Turn a validated message into readings with a lowercased device id and a real timestamp
pub fn decode_message(message: &RawMessage) -> Result<DecodedMessage, IngestError> {
    // Sub-millisecond precision is dropped
    let millis = (message.time * 1000.0).trunc() as i128;
    let time = millis
        .checked_mul(1_000_000)
        .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok())
        .ok_or_else(|| {
            IngestError::Validation("Invalid message: \"time\" is out of range".to_string())
        })?;

    Ok(DecodedMessage {
        device: message.device.to_lowercase(),
        time,
        rssi: message.rssi.filter(|rssi| rssi.is_finite()),
        data: decode_arduino_pm_hex(&message.data)?,
    })
}
