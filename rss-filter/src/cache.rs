//! Per-URL fetch cache.
//!
//! Entries are immutable and replaced whole. A refresh runs on its own tokio
//! task and is shared between every caller asking for the same URL while it
//! is in flight, so a URL is fetched at most once at a time and a client
//! hanging up never cancels a fetch other requests could use.

use crate::parser::FeedParser;
use crate::traits::FeedSource;
use crate::types::{FetchError, FetchedBody, Post, Validators};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

type FetchOutcome = Result<Arc<Vec<Post>>, FetchError>;
type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Posts from the last successful refresh, if there ever was one.
    pub posts: Option<Arc<Vec<Post>>>,
    pub refreshed_at: Option<Instant>,
    pub refreshed_at_utc: Option<DateTime<Utc>>,
    pub validators: Validators,
    pub last_error: Option<FetchError>,
}

impl CacheEntry {
    fn refreshed(posts: Arc<Vec<Post>>, validators: Validators) -> Self {
        Self {
            posts: Some(posts),
            refreshed_at: Some(Instant::now()),
            refreshed_at_utc: Some(Utc::now()),
            validators,
            last_error: None,
        }
    }

    fn failed(error: FetchError) -> Self {
        Self {
            posts: None,
            refreshed_at: None,
            refreshed_at_utc: None,
            validators: Validators::default(),
            last_error: Some(error),
        }
    }

    fn fresh_posts(&self, max_age: Duration) -> Option<Arc<Vec<Post>>> {
        match (&self.posts, self.refreshed_at) {
            (Some(posts), Some(at)) if at.elapsed() < max_age => Some(posts.clone()),
            _ => None,
        }
    }
}

/// Diagnostics for one cached URL.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub url: String,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub posts: usize,
    pub last_error: Option<String>,
}

#[derive(Clone)]
pub struct FeedCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    source: Arc<dyn FeedSource>,
    parser: FeedParser,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

impl FeedCache {
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                source,
                parser: FeedParser::new(),
                entries: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Posts for `url`, fetching only if the cached copy is older than
    /// `max_age` or missing.
    ///
    /// A failed refresh falls back to the stale copy when one exists; the
    /// error is kept on the entry for diagnostics.
    pub async fn get_posts(&self, url: &str, max_age: Duration) -> FetchOutcome {
        if let Some(posts) = self.inner.fresh(url, max_age).await {
            debug!("Cache hit for {}", url);
            return Ok(posts);
        }

        let fetch = {
            let mut in_flight = self.inner.in_flight.lock().await;

            // A refresh may have landed while we waited for the lock.
            if let Some(posts) = self.inner.fresh(url, max_age).await {
                debug!("Cache hit for {} after refresh", url);
                return Ok(posts);
            }

            match in_flight.get(url) {
                Some(fetch) => {
                    debug!("Joining in-flight fetch for {}", url);
                    fetch.clone()
                }
                None => {
                    let fetch = self.spawn_refresh(url.to_string());
                    in_flight.insert(url.to_string(), fetch.clone());
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Current entry for `url`, if any.
    pub async fn entry(&self, url: &str) -> Option<Arc<CacheEntry>> {
        self.inner.entries.read().await.get(url).cloned()
    }

    pub async fn statuses(&self) -> Vec<CacheStatus> {
        let entries = self.inner.entries.read().await;
        let mut statuses: Vec<CacheStatus> = entries
            .iter()
            .map(|(url, entry)| CacheStatus {
                url: url.clone(),
                refreshed_at: entry.refreshed_at_utc,
                age_secs: entry.refreshed_at.map(|at| at.elapsed().as_secs()),
                posts: entry.posts.as_ref().map(|p| p.len()).unwrap_or(0),
                last_error: entry.last_error.as_ref().map(|e| e.message.clone()),
            })
            .collect();
        statuses.sort_by(|a, b| a.url.cmp(&b.url));
        statuses
    }

    fn spawn_refresh(&self, url: String) -> SharedFetch {
        let inner = self.inner.clone();
        let task_url = url.clone();
        let handle = tokio::spawn(async move { inner.refresh(task_url).await });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(FetchError::new(url, format!("fetch task failed: {}", e))))
        }
        .boxed()
        .shared()
    }
}

impl CacheInner {
    async fn fresh(&self, url: &str, max_age: Duration) -> Option<Arc<Vec<Post>>> {
        self.entries
            .read()
            .await
            .get(url)
            .and_then(|entry| entry.fresh_posts(max_age))
    }

    async fn refresh(&self, url: String) -> FetchOutcome {
        let previous = self.entries.read().await.get(&url).cloned();
        let validators = previous
            .as_ref()
            .filter(|prev| prev.posts.is_some())
            .map(|prev| prev.validators.clone())
            .unwrap_or_default();

        let attempt = match self.source.fetch(&url, &validators).await {
            Ok(FetchedBody::Modified { body, validators }) => self
                .parser
                .parse_feed(&body)
                .map(|parsed| CacheEntry::refreshed(Arc::new(parsed.posts), validators))
                .map_err(|e| FetchError::new(&url, e.to_string())),
            Ok(FetchedBody::NotModified) => match previous.as_ref().and_then(|p| p.posts.clone()) {
                Some(posts) => {
                    debug!("{} not modified, reusing {} cached posts", url, posts.len());
                    Ok(CacheEntry::refreshed(posts, validators))
                }
                None => Err(FetchError::new(&url, "not modified but nothing cached")),
            },
            Err(e) => Err(e),
        };

        let (entry, outcome) = match attempt {
            Ok(entry) => {
                let posts = entry.posts.clone().unwrap_or_default();
                info!("Cached {} posts for {}", posts.len(), url);
                (entry, Ok(posts))
            }
            Err(err) => match previous.as_deref().filter(|prev| prev.posts.is_some()) {
                Some(prev) => {
                    warn!("Refresh of {} failed, serving stale copy: {}", url, err);
                    let stale = CacheEntry {
                        last_error: Some(err),
                        ..prev.clone()
                    };
                    let posts = stale.posts.clone().unwrap_or_default();
                    (stale, Ok(posts))
                }
                None => {
                    error!("Fetch of {} failed with nothing cached: {}", url, err);
                    (CacheEntry::failed(err.clone()), Err(err))
                }
            },
        };

        self.entries.write().await.insert(url.clone(), Arc::new(entry));
        self.in_flight.lock().await.remove(&url);

        outcome
    }
}
