use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::database::DeviceStore;
use crate::ingest::Ingestor;

pub mod auth;
pub mod error;
pub mod handlers;
pub mod logging;

pub use auth::ApiKey;
pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Ingestor,
    pub store: Arc<dyn DeviceStore>,
}

impl AppState {
    pub fn new(ingestor: Ingestor, store: Arc<dyn DeviceStore>) -> Self {
        AppState { ingestor, store }
    }
}

pub fn build_router(state: AppState, api_key: ApiKey) -> Router {
    let protected = Router::new()
        .route("/messages", post(handlers::incoming_message))
        .route("/devices", get(handlers::list_devices))
        .route(
            "/devices/:device_id",
            get(handlers::get_device).post(handlers::update_device),
        )
        .route_layer(middleware::from_fn_with_state(api_key, auth::check_api_key));

    Router::new()
        .route("/", get(handlers::root))
        .merge(protected)
        .fallback(handlers::not_found)
        // Tracing sits outside propagation so responses are logged with their id
        .layer(PropagateRequestIdLayer::new(logging::correlation_header()))
        .layer(
            TraceLayer::new_for_http()
                .on_request(logging::log_request)
                .on_response(logging::log_response),
        )
        .layer(SetRequestIdLayer::new(
            logging::correlation_header(),
            MakeRequestUuid,
        ))
        .with_state(state)
}
