mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{init_tracing, item, rss, Upstream};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use rss_filter::server::{build_router, AppState};
use rss_filter::{AppConfig, FeedCache, FeedParser, FeedPipeline, FetchConfig, Fetcher, StatsTracker};
use std::sync::Arc;
use tower::ServiceExt;

struct Harness {
    upstream: Upstream,
    app: axum::Router,
}

async fn harness() -> Harness {
    init_tracing();
    let upstream = Upstream::start().await.unwrap();

    let yaml = format!(
        r#"
feeds:
  - name: myfeed
    urls: ["{a}", "{b}"]
    exclude:
      - title: ".*iOS.*"
    include:
      - category: Python
  - name: lonely
    urls: ["{down}"]
"#,
        a = upstream.url("a.xml"),
        b = upstream.url("b.xml"),
        down = upstream.url("down.xml"),
    );
    let config = AppConfig::from_yaml_str(&yaml).unwrap();

    let fetch = FetchConfig {
        max_retries: 0,
        retry_delay_seconds: 0,
        timeout_seconds: 5,
        ..FetchConfig::default()
    };
    let cache = FeedCache::new(Arc::new(Fetcher::new(fetch).unwrap()));
    let pipeline = FeedPipeline::new(
        config.feeds.clone(),
        cache,
        Arc::new(StatsTracker::new()),
        config.cache_max_age,
    );

    Harness {
        upstream,
        app: build_router(AppState::new(pipeline)),
    }
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

fn publish_scenario(upstream: &Upstream) {
    upstream.publish(
        "a.xml",
        "\"a1\"",
        rss(&[
            item("https://habr.com/p/1", "iOS 17 review", &["Python"]),
            item("https://habr.com/p/2", "iOS 17 review, part two", &["Mobile"]),
            item("https://habr.com/p/123", "Shared post", &[]),
        ]),
    );
    upstream.publish(
        "b.xml",
        "\"b1\"",
        rss(&[
            item("https://habr.com/p/3", "Rust basics", &["Mobile"]),
            item("https://habr.com/p/123", "Shared post", &[]),
        ]),
    );
}

#[tokio::test]
async fn index_lists_feeds() {
    let h = harness().await;
    let (status, content_type, body) = get(&h.app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/html"));
    assert!(body.contains(r#"href="myfeed.rss""#));
    assert!(body.contains(r#"href="lonely.rss""#));
}

#[tokio::test]
async fn feed_is_merged_filtered_and_deduplicated() {
    let h = harness().await;
    publish_scenario(&h.upstream);

    let (status, content_type, body) = get(&h.app, "/myfeed.rss").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/rss+xml; charset=utf-8"));

    let parsed = FeedParser::new().parse_feed(body.as_bytes()).unwrap();
    let titles: Vec<&str> = parsed.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, vec!["iOS 17 review", "Shared post", "Rust basics"]);
    assert_eq!(
        parsed
            .posts
            .iter()
            .filter(|p| p.link == "https://habr.com/p/123")
            .count(),
        1
    );
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let h = harness().await;
    publish_scenario(&h.upstream);

    get(&h.app, "/myfeed.rss").await;
    get(&h.app, "/myfeed.rss").await;

    assert_eq!(h.upstream.hits(), 2);
}

#[tokio::test]
async fn unknown_feed_is_404() {
    let h = harness().await;

    let (status, _, _) = get(&h.app, "/nope.rss").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(&h.app, "/myfeed.atom").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn all_upstreams_down_is_502() {
    let h = harness().await;

    let (status, _, body) = get(&h.app, "/lonely.rss").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.contains("down.xml"));
}

#[tokio::test]
async fn one_upstream_down_serves_the_other() {
    let h = harness().await;
    h.upstream.publish(
        "b.xml",
        "\"b1\"",
        rss(&[item("https://habr.com/p/3", "Rust basics", &[])]),
    );

    let (status, _, body) = get(&h.app, "/myfeed.rss").await;
    assert_eq!(status, StatusCode::OK);
    let parsed = FeedParser::new().parse_feed(body.as_bytes()).unwrap();
    assert_eq!(parsed.posts.len(), 1);
    assert_eq!(parsed.posts[0].title, "Rust basics");
}

#[tokio::test]
async fn stats_reflect_verdicts() {
    let h = harness().await;
    publish_scenario(&h.upstream);
    get(&h.app, "/myfeed.rss").await;

    let (status, content_type, body) = get(&h.app, "/stats.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["counters"]["myfeed"]["passed"], 3);
    assert_eq!(json["counters"]["myfeed"]["blocked"], 1);
    assert_eq!(json["cache"].as_array().unwrap().len(), 2);

    let (status, _, page) = get(&h.app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("iOS 17 review, part two"));
    assert!(page.contains("Passed: 3, blocked: 1"));
}

#[tokio::test]
async fn health_is_ok() {
    let h = harness().await;
    let (status, _, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}
