/// Publishing observations to the event stream
use std::time::Duration;

use futures_util::future::BoxFuture;
use log::{debug, info};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::PublishError;
use crate::models::Observation;

pub const OBSERVATION_TOPIC: &str = "observation.incoming";

pub trait Publisher: Send + Sync {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        observation: &'a Observation,
    ) -> BoxFuture<'a, Result<(), PublishError>>;
}

/// Publish observations one after another, stopping at the first failure
pub async fn publish_observations(
    publisher: &dyn Publisher,
    observations: &[Observation],
) -> Result<(), PublishError> {
    for observation in observations {
        publisher.publish(OBSERVATION_TOPIC, observation).await?;
    }
    Ok(())
}

#[derive(Serialize)]
struct EventEnvelope<'a> {
    topic: &'a str,
    message: &'a Observation,
}

/// POSTs each event as `{"topic": ..., "message": ...}` to an HTTP endpoint
pub struct HttpPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpPublisher {
    /// `timeout` bounds each request, connecting included
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpPublisher {
            client,
            url: url.into(),
        })
    }
}

impl Publisher for HttpPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        observation: &'a Observation,
    ) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.url)
                .json(&EventEnvelope {
                    topic,
                    message: observation,
                })
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(PublishError::Rejected {
                    topic: topic.to_string(),
                    status: response.status().as_u16(),
                });
            }

            debug!("Published {} from {}", topic, observation.made_by_sensor);
            Ok(())
        })
    }
}

/// Writes events to the log instead of sending them anywhere
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        observation: &'a Observation,
    ) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            let json = serde_json::to_string(observation)
                .map_err(|e| PublishError::Unavailable(e.to_string()))?;
            info!("{}: {}", topic, json);
            Ok(())
        })
    }
}

/// Keeps every published event in memory, optionally failing after a number of events
#[derive(Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<(String, Observation)>>,
    fail_after: Option<usize>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` events, then report the stream as unavailable
    pub fn failing_after(count: usize) -> Self {
        MemoryPublisher {
            published: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    pub async fn published(&self) -> Vec<(String, Observation)> {
        self.published.lock().await.clone()
    }
}

impl Publisher for MemoryPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        observation: &'a Observation,
    ) -> BoxFuture<'a, Result<(), PublishError>> {
        Box::pin(async move {
            let mut published = self.published.lock().await;
            if self.fail_after.is_some_and(|limit| published.len() >= limit) {
                return Err(PublishError::Unavailable("memory publisher closed".into()));
            }
            published.push((topic.to_string(), observation.clone()));
            Ok(())
        })
    }
}
