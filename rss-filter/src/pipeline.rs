use crate::cache::FeedCache;
use crate::config::{FeedConfig, FeedRegistry};
use crate::merge::merge_and_dedup;
use crate::stats::{FeedCounters, StatsTracker};
use crate::types::{AggregatorError, FetchError, Post, Result};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one pipeline run for an output feed.
#[derive(Debug, Clone)]
pub struct BuiltFeed {
    pub name: String,
    pub posts: Vec<Post>,
    pub delta: FeedCounters,
    /// Upstreams that could not be fetched and had no cached copy.
    pub failed_urls: Vec<String>,
}

/// Builds output feeds: fetch, merge, dedup, filter, count.
#[derive(Clone)]
pub struct FeedPipeline {
    feeds: Arc<FeedRegistry>,
    cache: FeedCache,
    stats: Arc<StatsTracker>,
    max_age: Duration,
}

impl FeedPipeline {
    pub fn new(
        feeds: Arc<FeedRegistry>,
        cache: FeedCache,
        stats: Arc<StatsTracker>,
        max_age: Duration,
    ) -> Self {
        Self {
            feeds,
            cache,
            stats,
            max_age,
        }
    }

    pub fn feeds(&self) -> &FeedRegistry {
        &self.feeds
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Build the output feed called `name`.
    pub async fn build_feed_by_name(&self, name: &str) -> Result<BuiltFeed> {
        let feed = self
            .feeds
            .get(name)
            .cloned()
            .ok_or_else(|| AggregatorError::UnknownFeed {
                name: name.to_string(),
            })?;
        self.build_feed(&feed).await
    }

    /// Fails with a fetch error only when every upstream failed and none had
    /// a cached copy; otherwise builds from whatever is available.
    pub async fn build_feed(&self, feed: &FeedConfig) -> Result<BuiltFeed> {
        debug!("Building feed {} from {} upstreams", feed.name, feed.urls.len());

        let results = join_all(
            feed.urls
                .iter()
                .map(|url| self.cache.get_posts(url, self.max_age)),
        )
        .await;

        let mut sources = Vec::with_capacity(results.len());
        let mut failures: Vec<FetchError> = Vec::new();
        for result in results {
            match result {
                Ok(posts) => sources.push(posts),
                Err(e) => {
                    warn!("Feed {}: upstream unavailable: {}", feed.name, e);
                    failures.push(e);
                }
            }
        }

        if sources.is_empty() {
            if let Some(first) = failures.first().cloned() {
                return Err(AggregatorError::Fetch(first));
            }
        }

        let merged = merge_and_dedup(sources.iter().map(|posts| posts.iter().cloned()));

        let mut delta = FeedCounters::default();
        let mut kept = Vec::with_capacity(merged.len());
        let mut verdicts = Vec::with_capacity(merged.len());
        for post in &merged {
            let verdict = feed.filter.accept(post);
            debug!(
                "Feed {}: {} \"{}\" ({})",
                feed.name,
                if verdict.kept { "passed" } else { "blocked" },
                post.title,
                verdict.reason
            );
            if verdict.kept {
                delta.passed += 1;
            } else {
                delta.blocked += 1;
            }
            verdicts.push((post, verdict));
        }
        self.stats.record_all(&feed.name, verdicts.iter().copied()).await;

        for (post, verdict) in verdicts {
            if verdict.kept {
                kept.push(post.clone());
            }
        }

        info!(
            "Built feed {}: {} passed, {} blocked, {} upstreams failed",
            feed.name,
            delta.passed,
            delta.blocked,
            failures.len()
        );

        Ok(BuiltFeed {
            name: feed.name.clone(),
            posts: kept,
            delta,
            failed_urls: failures.into_iter().map(|e| e.url).collect(),
        })
    }
}
