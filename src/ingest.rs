/// From Sigfox callback body to published observations
use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::database::DeviceStore;
use crate::decoder::{decode_message, validate_message};
use crate::error::IngestError;
use crate::events::{publish_observations, Publisher};
use crate::models::DeviceUpdate;
use crate::observations::decoded_message_to_observations;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub device: String,
    pub observations: usize,
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn DeviceStore>,
    publisher: Arc<dyn Publisher>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DeviceStore>, publisher: Arc<dyn Publisher>) -> Self {
        Ingestor { store, publisher }
    }

    /// Validate, decode, calibrate and publish one message
    ///
    /// A device with no record on file simply gets uncorrected observations.
    /// The record's last contact time is updated before anything is published.
    pub async fn ingest(&self, body: &Value) -> Result<IngestOutcome, IngestError> {
        let raw = validate_message(body)?;
        let decoded = decode_message(&raw)?;
        debug!("Decoded message from {}: {:?}", decoded.device, decoded.data);

        let device = self.store.find_by_id(&decoded.device).await?;
        if device.is_none() {
            debug!("No device on record for {}, skipping calibration", decoded.device);
        }

        let observations = decoded_message_to_observations(&decoded, device.as_ref());

        self.store
            .upsert(&decoded.device, DeviceUpdate::last_message(decoded.time))
            .await?;

        publish_observations(self.publisher.as_ref(), &observations).await?;

        Ok(IngestOutcome {
            device: decoded.device,
            observations: observations.len(),
        })
    }
}
