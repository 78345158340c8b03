use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use log::debug;

use crate::server::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared secret every protected route must present
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(Arc::from(key.into()))
    }

    fn matches(&self, sent: &str) -> bool {
        *self.0 == *sent
    }
}

pub async fn check_api_key(
    State(api_key): State<ApiKey>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    debug!("Checking API key");

    let sent = request
        .headers()
        .get(API_KEY_HEADER)
        .map(|value| value.to_str().unwrap_or_default());

    let verdict = match sent {
        None | Some("") => {
            debug!("No API key provided");
            Err(ApiError::Unauthorized(format!(
                "You must provide an API Key as the value of the {} header",
                API_KEY_HEADER
            )))
        }
        Some(key) if api_key.matches(key) => Ok(()),
        Some(_) => {
            debug!("API key is invalid");
            Err(ApiError::InvalidApiKey("Invalid API Key".to_string()))
        }
    };
    verdict?;

    Ok(next.run(request).await)
}
