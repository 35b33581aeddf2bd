use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;

use super::AppState;
use crate::cache::CacheStatus;
use crate::html;
use crate::stats::{FeedCounters, FeedReport};
use crate::types::{AggregatorError, Result};
use crate::writer::{FeedWriter, RSS_CONTENT_TYPE};

pub async fn index_handler(State(app_state): State<AppState>) -> Html<String> {
    Html(html::index_page(app_state.pipeline().feeds().names()).into_string())
}

/// Serves `/{name}.rss`; anything without the `.rss` suffix is unknown.
pub async fn feed_handler(
    State(app_state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response> {
    let name = file
        .strip_suffix(".rss")
        .ok_or_else(|| AggregatorError::UnknownFeed { name: file.clone() })?;

    let built = app_state.pipeline().build_feed_by_name(name).await?;
    let body = FeedWriter::new().write_feed(&built.name, &format!("/{}", file), &built.posts)?;

    Ok(([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], body).into_response())
}

pub async fn stats_handler(State(app_state): State<AppState>) -> Html<String> {
    let pipeline = app_state.pipeline();
    let reports = pipeline.stats().report().await;
    let cache = pipeline.cache().statuses().await;
    Html(html::stats_page(&reports, &cache).into_string())
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub counters: BTreeMap<String, FeedCounters>,
    pub feeds: Vec<FeedReport>,
    pub cache: Vec<CacheStatus>,
}

pub async fn stats_json_handler(State(app_state): State<AppState>) -> Json<StatsResponse> {
    let pipeline = app_state.pipeline();
    Json(StatsResponse {
        counters: pipeline.stats().snapshot().await,
        feeds: pipeline.stats().report().await,
        cache: pipeline.cache().statuses().await,
    })
}

pub async fn health_handler() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
