use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub host: String,
    pub port: u16,
    pub log_level: LevelFilter,
    /// PostgreSQL connection string, in-memory store when absent
    pub database_url: Option<String>,
    pub db_connect_retries: usize,
    /// Event stream endpoint, events are only logged when absent
    pub events_url: Option<String>,
    /// Upper bound for one event publish request
    pub events_timeout: Duration,
}

impl AppConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = read("API_KEY").ok_or("API_KEY environment variable not set")?;

        let port = match read("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| format!("PORT must be a port number, got '{}'", port))?,
            None => 8080,
        };

        let log_level = match read("LOG_LEVEL") {
            Some(level) => LevelFilter::from_str(&level)
                .map_err(|_| format!("LOG_LEVEL '{}' is not a log level", level))?,
            None => LevelFilter::Info,
        };

        let db_connect_retries = match read("DB_CONNECT_RETRIES") {
            Some(retries) => retries
                .parse()
                .map_err(|_| format!("DB_CONNECT_RETRIES must be a number, got '{}'", retries))?,
            None => 3,
        };

        let events_timeout = match read("EVENTS_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                format!("EVENTS_TIMEOUT_SECS must be a number, got '{}'", secs)
            })?),
            None => Duration::from_secs(10),
        };

        Ok(AppConfig {
            api_key,
            host: read("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            log_level,
            database_url: read("DATABASE_URL"),
            db_connect_retries,
            events_url: read("EVENTS_URL"),
            events_timeout,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
