pub mod publisher;

pub use publisher::{
    publish_observations, HttpPublisher, LogPublisher, MemoryPublisher, Publisher,
    OBSERVATION_TOPIC,
};
