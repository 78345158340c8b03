use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::TcpListener;

use sigfox_arduino_pm::config::AppConfig;
use sigfox_arduino_pm::database::{DeviceStore, MemoryDeviceStore, PgDeviceStore};
use sigfox_arduino_pm::error::PublishError;
use sigfox_arduino_pm::events::{HttpPublisher, LogPublisher, Publisher};
use sigfox_arduino_pm::ingest::Ingestor;
use sigfox_arduino_pm::server::{build_router, ApiKey, AppState};

async fn build_store(config: &AppConfig) -> Arc<dyn DeviceStore> {
    let store: Arc<dyn DeviceStore> = match &config.database_url {
        Some(url) => {
            let store = PgDeviceStore::new(url.clone(), config.db_connect_retries);
            if let Err(e) = store.init().await {
                // Keep serving, each store call tries to connect again
                error!("Initial device database connection failed: {}", e);
            }
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, device records will only be kept in memory");
            Arc::new(MemoryDeviceStore::new())
        }
    };
    store
}

fn build_publisher(config: &AppConfig) -> Result<Arc<dyn Publisher>, PublishError> {
    let publisher: Arc<dyn Publisher> = match &config.events_url {
        Some(url) => {
            info!("Publishing observations to {}", url);
            Arc::new(HttpPublisher::new(url.clone(), config.events_timeout)?)
        }
        None => {
            warn!("EVENTS_URL not set, observations will only be logged");
            Arc::new(LogPublisher)
        }
    };
    Ok(publisher)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = match AppConfig::new() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(config.log_level)
        .format_timestamp_secs()
        .init();

    let store = build_store(&config).await;
    let publisher = match build_publisher(&config) {
        Ok(publisher) => publisher,
        Err(e) => {
            error!("Failed to set up the event publisher: {}", e);
            return Err(e.into());
        }
    };

    let ingestor = Ingestor::new(store.clone(), publisher);
    let app = build_router(
        AppState::new(ingestor, store),
        ApiKey::new(config.api_key.clone()),
    );

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Server is running on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutdown signal received. Exiting gracefully.");
        })
        .await?;

    Ok(())
}
