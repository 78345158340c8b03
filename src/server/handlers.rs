use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use log::{error, info, warn};
use serde_json::Value;

use crate::database::check_device_id;
use crate::models::{Calibration, DeviceRecord, DeviceUpdate, FieldUpdate, Pollutant};
use crate::server::error::ApiError;
use crate::server::AppState;

pub const MESSAGE_RECEIVED: &str = "Message successfully received";

pub async fn root() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

pub async fn not_found() -> (StatusCode, &'static str) {
    (
        StatusCode::NOT_FOUND,
        "This API endpoint has not been defined.",
    )
}

/// Sigfox callback
///
/// Anything that parses as JSON is acknowledged with 200 so the network does not
/// redeliver a message that can never be processed. Failures are logged.
pub async fn incoming_message(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<String, ApiError> {
    let Json(body) = body?;

    match state.ingestor.ingest(&body).await {
        Ok(outcome) => {
            info!(
                "Published {} observations for device {}",
                outcome.observations, outcome.device
            );
            Ok(MESSAGE_RECEIVED.to_string())
        }
        Err(err) => {
            if err.is_input_error() {
                warn!("Rejected message ({}): {}", err.kind(), err);
            } else {
                error!("Failed to process message ({}): {}", err.kind(), err);
            }
            Ok(format!("Message not processed ({})", err.kind()))
        }
    }
}

pub async fn list_devices(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeviceRecord>>, ApiError> {
    let devices = state
        .store
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to get devices", e))?;
    Ok(Json(devices))
}

pub async fn get_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let device_id = device_id.to_lowercase();
    let device = state
        .store
        .find_by_id(&device_id)
        .await
        .map_err(|e| ApiError::database("Failed to get device", e))?;
    device.map(Json).ok_or(ApiError::DeviceNotFound(device_id))
}

/// Set or clear calibrations, creating the device if it is new
pub async fn update_device(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<DeviceRecord>, ApiError> {
    let Json(body) = body?;
    let device_id = device_id.to_lowercase();
    check_device_id(&device_id).map_err(|e| ApiError::InvalidBody(e.to_string()))?;

    let update = parse_calibration_update(&body)?;
    let device = state
        .store
        .upsert(&device_id, update)
        .await
        .map_err(|e| ApiError::database("Failed to update device", e))?;
    Ok(Json(device))
}

/// Only calibrations may be changed through the API, at least one per request
fn parse_calibration_update(body: &Value) -> Result<DeviceUpdate, ApiError> {
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::InvalidBody("body must be a JSON object".to_string()))?;

    if let Some(key) = object
        .keys()
        .find(|key| !Pollutant::ALL.iter().any(|p| p.key() == key.as_str()))
    {
        return Err(ApiError::InvalidBody(format!("\"{}\" is not allowed", key)));
    }
    if object.is_empty() {
        return Err(ApiError::InvalidBody(
            "body must contain at least one of pm1, pm2p5, pm10".to_string(),
        ));
    }

    let mut update = DeviceUpdate::default();
    for pollutant in Pollutant::ALL {
        let key = pollutant.key();
        *update.calibration_mut(pollutant) =
            FieldUpdate::from_body(object.get(key), |v| Calibration::from_value(key, v))
                .map_err(|e| ApiError::InvalidBody(e.to_string()))?;
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_set_and_clear() {
        let update = parse_calibration_update(&json!({
            "pm1": null,
            "pm10": {"lt85": {"m": 1, "c": 0}, "gte85": {"m": 1.01, "c": 0}}
        }))
        .unwrap();
        assert_eq!(update.pm1, FieldUpdate::Cleared);
        assert_eq!(update.pm2p5, FieldUpdate::Unchanged);
        assert!(matches!(update.pm10, FieldUpdate::Set(_)));
        assert_eq!(update.last_message_at, None);
    }

    #[test]
    fn rejects_fields_other_than_calibrations() {
        for body in [
            json!({"lastMessageAt": "2020-09-21T17:07:33.826Z"}),
            json!({"id": "456cba"}),
            json!({}),
            json!([]),
        ] {
            let err = parse_calibration_update(&body).unwrap_err();
            assert_eq!(err.error_code(), "InvalidBody", "{}", body);
        }
    }

    #[test]
    fn rejects_partial_calibrations() {
        let err = parse_calibration_update(&json!({"pm2p5": {"lt85": {"m": 1, "c": 0}}}))
            .unwrap_err();
        assert_eq!(err.error_code(), "InvalidBody");
        assert!(err.to_string().contains("pm2p5"));
    }
}
