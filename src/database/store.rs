/// Device store abstraction with PostgreSQL and in-memory backends
use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use tokio::sync::{Mutex, RwLock};
use tokio_postgres::Client;

use crate::database::connection::connect_with_retry;
use crate::database::operations::{ensure_schema, find_device, list_devices, upsert_device};
use crate::error::StoreError;
use crate::models::{DeviceRecord, DeviceUpdate};

/// Sigfox device ids are at most 6 characters long
pub const MAX_DEVICE_ID_LEN: usize = 6;

/// Persistence for per-device calibration and last contact time
///
/// Ids are expected to be lowercased by the caller. Writes are last-writer-wins.
pub trait DeviceStore: Send + Sync {
    fn find_by_id<'a>(&'a self, id: &'a str)
        -> BoxFuture<'a, Result<Option<DeviceRecord>, StoreError>>;

    /// Create the device if needed, then apply the update
    fn upsert<'a>(
        &'a self,
        id: &'a str,
        update: DeviceUpdate,
    ) -> BoxFuture<'a, Result<DeviceRecord, StoreError>>;

    fn list(&self) -> BoxFuture<'_, Result<Vec<DeviceRecord>, StoreError>>;
}

pub fn check_device_id(id: &str) -> Result<(), StoreError> {
    if id.chars().count() > MAX_DEVICE_ID_LEN {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Devices table in PostgreSQL behind one shared client
///
/// The client is opened lazily and replaced once its connection has closed.
/// Reconnects made while serving a request try once, so an outage surfaces
/// as a `StoreError` without waiting out the startup retry budget.
pub struct PgDeviceStore {
    database_url: String,
    connect_attempts: usize,
    client: Mutex<Option<Arc<Client>>>,
}

impl PgDeviceStore {
    pub fn new(database_url: impl Into<String>, connect_attempts: usize) -> Self {
        PgDeviceStore {
            database_url: database_url.into(),
            connect_attempts,
            client: Mutex::new(None),
        }
    }

    /// Connect with the full retry budget and create the table
    ///
    /// A failure leaves the store usable; the next operation connects again.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.client_with_attempts(self.connect_attempts).await?;
        info!("Connected to the device database");
        Ok(())
    }

    async fn client(&self) -> Result<Arc<Client>, StoreError> {
        self.client_with_attempts(1).await
    }

    async fn client_with_attempts(&self, attempts: usize) -> Result<Arc<Client>, StoreError> {
        let mut cached = self.client.lock().await;
        if let Some(client) = cached.as_ref().filter(|c| !c.is_closed()) {
            return Ok(client.clone());
        }
        if cached.take().is_some() {
            warn!("Device database connection closed, reconnecting");
        }

        let client = connect_with_retry(&self.database_url, attempts).await?;
        ensure_schema(&client).await?;
        let client = Arc::new(client);
        *cached = Some(client.clone());
        Ok(client)
    }
}

impl DeviceStore for PgDeviceStore {
    fn find_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<DeviceRecord>, StoreError>> {
        Box::pin(async move {
            let client = self.client().await?;
            find_device(&client, id).await
        })
    }

    fn upsert<'a>(
        &'a self,
        id: &'a str,
        update: DeviceUpdate,
    ) -> BoxFuture<'a, Result<DeviceRecord, StoreError>> {
        Box::pin(async move {
            check_device_id(id)?;
            let client = self.client().await?;
            let device = upsert_device(&client, id, &update).await?;
            debug!("Upserted device {}", id);
            Ok(device)
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<DeviceRecord>, StoreError>> {
        Box::pin(async move {
            let client = self.client().await?;
            list_devices(&client).await
        })
    }
}

/// Process-local store, used when no database is configured and in tests
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<BTreeMap<String, DeviceRecord>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn find_by_id<'a>(
        &'a self,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<DeviceRecord>, StoreError>> {
        Box::pin(async move { Ok(self.devices.read().await.get(id).cloned()) })
    }

    fn upsert<'a>(
        &'a self,
        id: &'a str,
        update: DeviceUpdate,
    ) -> BoxFuture<'a, Result<DeviceRecord, StoreError>> {
        Box::pin(async move {
            check_device_id(id)?;
            let mut devices = self.devices.write().await;
            let device = devices
                .entry(id.to_string())
                .or_insert_with(|| DeviceRecord::new(id));
            device.apply(&update);
            Ok(device.clone())
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<DeviceRecord>, StoreError>> {
        Box::pin(async move { Ok(self.devices.read().await.values().cloned().collect()) })
    }
}
