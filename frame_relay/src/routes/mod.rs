mod health;
mod index;
mod latest_image;
mod metrics;
mod trigger;
mod upload;

use crate::server::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use health::healthcheck;
use index::capture_page;
use latest_image::latest_image;
use metrics::metrics_handler;
use trigger::trigger_analysis;
use upload::upload;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(capture_page))
        .route("/upload", post(upload))
        .route("/latest.jpg", get(latest_image))
        .route("/trigger_analysis", post(trigger_analysis))
        .route("/health", get(healthcheck))
        .route("/metrics", get(metrics_handler))
}
