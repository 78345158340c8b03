use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod, SslVerifyMode};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use tokio_postgres::{Client, NoTls};
use url::{form_urlencoded, Url};

use crate::error::StoreError;

const WAIT_BETWEEN_RETRIES: u64 = 2;

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert: {}", e))?;

    builder.set_verify(SslVerifyMode::NONE); // self-signed server certs

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Pull `sslrootcert` out of a connection url
///
/// tokio-postgres does not understand the parameter, so it is removed and
/// returned separately. The remaining query parameters are kept.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, Option<String>), String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    // Other parameters are kept as raw segments so their encoding is untouched
    let mut sslrootcert_path = None;
    let mut kept_segments = Vec::new();
    for segment in url.query().unwrap_or_default().split('&') {
        if segment.is_empty() {
            continue;
        }
        match form_urlencoded::parse(segment.as_bytes()).next() {
            Some((key, value)) if key == "sslrootcert" => {
                sslrootcert_path = Some(value.into_owned());
            }
            _ => kept_segments.push(segment),
        }
    }

    let mut clean_url = url.clone();
    if kept_segments.is_empty() {
        clean_url.set_query(None);
    } else {
        clean_url.set_query(Some(&kept_segments.join("&")));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a connection, using TLS when the url names a root certificate
///
/// Only establishing the connection is retried. Queries run on the returned
/// client are never retried.
pub async fn connect_with_retry(database_url: &str, max_attempts: usize) -> Result<Client, StoreError> {
    let (clean_database_url, sslrootcert_path) =
        split_sslrootcert(database_url).map_err(StoreError::Connection)?;

    let mut last_error = String::from("no connection attempts made");

    for attempt in 0..max_attempts.max(1) {
        match connect(&clean_database_url, sslrootcert_path.as_deref()).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                warn!("Attempt {}: {}", attempt + 1, e);
                last_error = e;
            }
        }

        if attempt + 1 < max_attempts {
            tokio::time::sleep(Duration::from_secs(WAIT_BETWEEN_RETRIES)).await;
        }
    }

    Err(StoreError::Connection(last_error))
}

async fn connect(database_url: &str, sslrootcert_path: Option<&str>) -> Result<Client, String> {
    match sslrootcert_path {
        Some(path) => {
            let connector = create_ssl_connector(path)?;
            let (client, connection) = tokio_postgres::connect(database_url, connector)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            Ok(client)
        }
        None => {
            let (client, connection) = tokio_postgres::connect(database_url, NoTls)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            Ok(client)
        }
    }
}
