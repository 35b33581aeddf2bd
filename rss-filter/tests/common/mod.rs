//! Shared helpers for integration tests.
//!
//! [`Upstream`] is a tiny axum server on a random local port that plays the
//! part of the upstream RSS sites.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::net::TcpListener;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn rss(items: &[String]) -> String {
    let mut doc = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
<channel>
<title>Upstream</title>
<link>https://habr.com/</link>
<description>test</description>
"#,
    );
    for item in items {
        doc.push_str("<item>");
        doc.push_str(item);
        doc.push_str("</item>\n");
    }
    doc.push_str("</channel>\n</rss>\n");
    doc
}

pub fn item(link: &str, title: &str, categories: &[&str]) -> String {
    let cats: String = categories
        .iter()
        .map(|c| format!("<category>{c}</category>"))
        .collect();
    format!(
        "<title>{title}</title><guid isPermaLink=\"true\">{link}</guid><link>{link}</link>\
         <description>body</description><pubDate>Mon, 02 Oct 2023 10:00:00 GMT</pubDate>\
         {cats}<dc:creator>alice</dc:creator>"
    )
}

#[derive(Default)]
struct UpstreamState {
    /// path -> (etag, body)
    feeds: Mutex<HashMap<String, (String, String)>>,
    hits: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

/// Handle to the running fake upstream.
pub struct Upstream {
    addr: SocketAddr,
    state: Arc<UpstreamState>,
}

impl Upstream {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(UpstreamState::default());

        let app = Router::new()
            .route("/{path}", get(serve_feed))
            .with_state(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, state })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    pub fn publish(&self, path: &str, etag: &str, body: String) {
        self.state
            .feeds
            .lock()
            .unwrap()
            .insert(path.to_string(), (etag.to_string(), body));
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

async fn serve_feed(
    State(state): State<Arc<UpstreamState>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let feed = state.feeds.lock().unwrap().get(&path).cloned();
    let Some((etag, body)) = feed else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());
    if if_none_match == Some(etag.as_str()) {
        return StatusCode::NOT_MODIFIED.into_response();
    }

    (
        [
            (header::CONTENT_TYPE, "application/rss+xml".to_string()),
            (header::ETAG, etag),
        ],
        body,
    )
        .into_response()
}
