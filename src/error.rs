/// Error types shared by the decoding pipeline, the device store and the publisher
use thiserror::Error;

/// Failure to turn a hex payload into readings
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("payload must be {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A calibration object that is present but unusable
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid calibration for \"{field}\": {reason}")]
pub struct CalibrationError {
    pub field: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not connect to the device store: {0}")]
    Connection(String),

    #[error("device store query failed: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("device id '{0}' is too long")]
    InvalidId(String),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event stream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("event stream rejected {topic} event with status {status}")]
    Rejected { topic: String, status: u16 },

    #[error("event stream unavailable: {0}")]
    Unavailable(String),
}

/// Everything that can stop an incoming message from becoming published observations.
///
/// `Validation`, `Decode` and `Calibration` are problems with the data itself and
/// must never be retried. `Store` and `Publish` come from collaborators and are
/// handed back to the caller untouched.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),

    #[error("failed to decode payload: {0}")]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error(transparent)]
    Store(StoreError),

    #[error("failed to publish observation: {0}")]
    Publish(#[from] PublishError),
}

impl IngestError {
    /// Stable discriminant, safe to log and to hand to clients
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Validation(_) => "ValidationError",
            IngestError::Decode(_) => "DecodeError",
            IngestError::Calibration(_) => "CalibrationDataError",
            IngestError::Store(_) => "StoreFailure",
            IngestError::Publish(_) => "PublishFailure",
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            IngestError::Validation(_) | IngestError::Decode(_) | IngestError::Calibration(_)
        )
    }
}

impl From<StoreError> for IngestError {
    fn from(err: StoreError) -> Self {
        match err {
            // A malformed stored calibration is a data problem, not an outage
            StoreError::Calibration(e) => IngestError::Calibration(e),
            other => IngestError::Store(other),
        }
    }
}
