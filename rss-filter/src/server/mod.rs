//! HTTP surface over the feed pipeline.
//!
//! # Endpoints
//!
//! - `GET /` - HTML list of output feeds
//! - `GET /{name}.rss` - filtered feed (404 for unknown names, 502 when every upstream is down)
//! - `GET /stats` - HTML filter statistics and upstream cache status
//! - `GET /stats.json` - the same statistics as JSON
//! - `GET /health` - returns 200 if the server is running

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::pipeline::FeedPipeline;
use crate::types::AggregatorError;

pub mod handlers;

pub use handlers::{feed_handler, health_handler, index_handler, stats_handler, stats_json_handler};

/// Shared application state, handed to every handler through axum's `State`.
#[derive(Clone)]
pub struct AppState {
    pipeline: FeedPipeline,
}

impl AppState {
    pub fn new(pipeline: FeedPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &FeedPipeline {
        &self.pipeline
    }
}

pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/", get(index_handler))
        .route("/stats", get(stats_handler))
        .route("/stats.json", get(stats_json_handler))
        .route("/health", get(health_handler))
        .route("/{file}", get(feed_handler))
        .with_state(app_state)
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        let status = match &self {
            AggregatorError::UnknownFeed { .. } => StatusCode::NOT_FOUND,
            AggregatorError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, self.to_string()).into_response()
    }
}
