//! Sigfox callback ingestion for Arduino particulate-matter sensors.
//!
//! Payloads are decoded into temperature, humidity and PM readings, corrected
//! with per-device calibrations when available, and published as observations.

pub mod calibration;
pub mod config;
pub mod database;
pub mod decoder;
pub mod error;
pub mod events;
pub mod ingest;
pub mod models;
pub mod observations;
pub mod server;
pub mod utils;
