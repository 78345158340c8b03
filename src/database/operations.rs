/// SQL for reading and upserting device records
use serde_json::Value;
use time::OffsetDateTime;
use tokio_postgres::types::Json;
use tokio_postgres::{Client, Row};

use crate::error::StoreError;
use crate::models::{Calibration, DeviceRecord, DeviceUpdate, Pollutant};

pub const CREATE_DEVICES_TABLE: &str = "CREATE TABLE IF NOT EXISTS devices (
    id              VARCHAR(6) PRIMARY KEY,
    last_message_at TIMESTAMPTZ,
    pm1             JSONB,
    pm2p5           JSONB,
    pm10            JSONB
)";

const DEVICE_COLUMNS: &str = "id, last_message_at, pm1, pm2p5, pm10";

/// Create the devices table if it does not exist yet
pub async fn ensure_schema(client: &Client) -> Result<(), StoreError> {
    client.batch_execute(CREATE_DEVICES_TABLE).await?;
    Ok(())
}

pub async fn find_device(client: &Client, id: &str) -> Result<Option<DeviceRecord>, StoreError> {
    let row = client
        .query_opt(
            &format!("SELECT {} FROM devices WHERE id = $1", DEVICE_COLUMNS),
            &[&id],
        )
        .await?;

    row.as_ref().map(row_to_device).transpose()
}

pub async fn list_devices(client: &Client) -> Result<Vec<DeviceRecord>, StoreError> {
    let rows = client
        .query(
            &format!("SELECT {} FROM devices ORDER BY id", DEVICE_COLUMNS),
            &[],
        )
        .await?;

    rows.iter().map(row_to_device).collect()
}

/// Insert or update a device in one statement
///
/// `last_message_at` is only overwritten when the update carries one. Each
/// calibration column is written when its update is `Set` or `Cleared` and
/// left alone when `Unchanged`.
pub async fn upsert_device(
    client: &Client,
    id: &str,
    update: &DeviceUpdate,
) -> Result<DeviceRecord, StoreError> {
    let statement = format!(
        "INSERT INTO devices (id, last_message_at, pm1, pm2p5, pm10)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO UPDATE SET
             last_message_at = COALESCE(EXCLUDED.last_message_at, devices.last_message_at),
             pm1 = CASE WHEN $6 THEN EXCLUDED.pm1 ELSE devices.pm1 END,
             pm2p5 = CASE WHEN $7 THEN EXCLUDED.pm2p5 ELSE devices.pm2p5 END,
             pm10 = CASE WHEN $8 THEN EXCLUDED.pm10 ELSE devices.pm10 END
         RETURNING {}",
        DEVICE_COLUMNS
    );

    let pm1 = update.pm1.new_value().map(Json);
    let pm2p5 = update.pm2p5.new_value().map(Json);
    let pm10 = update.pm10.new_value().map(Json);

    let row = client
        .query_one(
            &statement,
            &[
                &id,
                &update.last_message_at,
                &pm1,
                &pm2p5,
                &pm10,
                &update.pm1.touches(),
                &update.pm2p5.touches(),
                &update.pm10.touches(),
            ],
        )
        .await?;

    row_to_device(&row)
}

fn row_to_device(row: &Row) -> Result<DeviceRecord, StoreError> {
    let mut device = DeviceRecord::new(row.try_get::<_, String>("id")?);
    device.last_message_at = row.try_get::<_, Option<OffsetDateTime>>("last_message_at")?;
    device.pm1 = calibration_column(row, Pollutant::Pm1)?;
    device.pm2p5 = calibration_column(row, Pollutant::Pm2p5)?;
    device.pm10 = calibration_column(row, Pollutant::Pm10)?;
    Ok(device)
}

fn calibration_column(row: &Row, pollutant: Pollutant) -> Result<Option<Calibration>, StoreError> {
    let key = pollutant.key();
    match row.try_get::<_, Option<Value>>(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(Calibration::from_value(key, &value)?)),
    }
}
