use crate::filter::{Reason, Verdict};
use crate::types::Post;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Most recent verdicts remembered per feed for the stats page.
const MAX_RECENT_POSTS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedCounters {
    pub passed: u64,
    pub blocked: u64,
}

/// Latest verdict for one post title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentPost {
    pub title: String,
    pub link: String,
    pub creator: String,
    pub categories: Vec<String>,
    pub kept: bool,
    pub reason: Reason,
    #[serde(skip)]
    seq: u64,
}

#[derive(Debug, Default)]
struct FeedStats {
    counters: FeedCounters,
    recent: HashMap<String, RecentPost>,
}

impl FeedStats {
    fn record(&mut self, post: &Post, verdict: Verdict, seq: u64) {
        if verdict.kept {
            self.counters.passed += 1;
        } else {
            self.counters.blocked += 1;
        }

        self.recent.insert(
            post.title.clone(),
            RecentPost {
                title: post.title.clone(),
                link: post.link.clone(),
                creator: post.creator.clone(),
                categories: post.categories.clone(),
                kept: verdict.kept,
                reason: verdict.reason,
                seq,
            },
        );

        if self.recent.len() > MAX_RECENT_POSTS {
            let oldest = self
                .recent
                .iter()
                .min_by_key(|(_, p)| p.seq)
                .map(|(title, _)| title.clone());
            if let Some(title) = oldest {
                self.recent.remove(&title);
            }
        }
    }

    fn report(&self, name: &str) -> FeedReport {
        let mut passed: Vec<RecentPost> = self.recent.values().filter(|p| p.kept).cloned().collect();
        let mut blocked: Vec<RecentPost> = self.recent.values().filter(|p| !p.kept).cloned().collect();
        passed.sort_by(|a, b| a.title.cmp(&b.title));
        blocked.sort_by(|a, b| a.title.cmp(&b.title));

        FeedReport {
            name: name.to_string(),
            counters: self.counters,
            passed_categories: tally(passed.iter().flat_map(|p| p.categories.iter())),
            blocked_categories: tally(blocked.iter().flat_map(|p| p.categories.iter())),
            passed_creators: tally(passed.iter().map(|p| &p.creator)),
            blocked_creators: tally(blocked.iter().map(|p| &p.creator)),
            passed,
            blocked,
        }
    }
}

/// Counts values, most frequent first, ties by name.
fn tally<'a>(values: impl Iterator<Item = &'a String>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Detailed per-feed view for the stats page.
#[derive(Debug, Clone, Serialize)]
pub struct FeedReport {
    pub name: String,
    pub counters: FeedCounters,
    pub passed: Vec<RecentPost>,
    pub blocked: Vec<RecentPost>,
    pub passed_categories: Vec<(String, usize)>,
    pub blocked_categories: Vec<(String, usize)>,
    pub passed_creators: Vec<(String, usize)>,
    pub blocked_creators: Vec<(String, usize)>,
}

/// Process-wide passed/blocked counters per output feed.
///
/// Counters only ever grow; there is no reset.
#[derive(Debug, Default)]
pub struct StatsTracker {
    inner: RwLock<StatsInner>,
}

#[derive(Debug, Default)]
struct StatsInner {
    feeds: HashMap<String, FeedStats>,
    seq: u64,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, feed: &str, post: &Post, verdict: Verdict) {
        self.record_all(feed, [(post, verdict)]).await;
    }

    /// Record several verdicts for `feed` under one lock acquisition.
    pub async fn record_all<'a, I>(&self, feed: &str, verdicts: I)
    where
        I: IntoIterator<Item = (&'a Post, Verdict)>,
    {
        let mut inner = self.inner.write().await;
        let StatsInner { feeds, seq } = &mut *inner;
        let stats = feeds.entry(feed.to_string()).or_default();
        for (post, verdict) in verdicts {
            *seq += 1;
            stats.record(post, verdict, *seq);
        }
    }

    pub async fn snapshot(&self) -> BTreeMap<String, FeedCounters> {
        self.inner
            .read()
            .await
            .feeds
            .iter()
            .map(|(name, stats)| (name.clone(), stats.counters))
            .collect()
    }

    pub async fn report(&self) -> Vec<FeedReport> {
        let inner = self.inner.read().await;
        let mut reports: Vec<FeedReport> = inner
            .feeds
            .iter()
            .map(|(name, stats)| stats.report(name))
            .collect();
        reports.sort_by(|a, b| a.name.cmp(&b.name));
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::post;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const KEPT: Verdict = Verdict {
        kept: true,
        reason: Reason::Default,
    };
    const DROPPED: Verdict = Verdict {
        kept: false,
        reason: Reason::Excluded,
    };

    #[tokio::test]
    async fn counts_per_feed() {
        let stats = StatsTracker::new();
        stats.record("a", &post("one", "", &[]), KEPT).await;
        stats.record("a", &post("two", "", &[]), DROPPED).await;
        stats.record("b", &post("three", "", &[]), KEPT).await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot["a"], FeedCounters { passed: 1, blocked: 1 });
        assert_eq!(snapshot["b"], FeedCounters { passed: 1, blocked: 0 });
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let stats = Arc::new(StatsTracker::new());
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let stats = stats.clone();
                tokio::spawn(async move {
                    let p = post(&format!("post {i}"), "", &[]);
                    for _ in 0..10 {
                        stats.record("shared", &p, if i % 2 == 0 { KEPT } else { DROPPED }).await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let snapshot = stats.snapshot().await;
        assert_eq!(
            snapshot["shared"],
            FeedCounters {
                passed: 160,
                blocked: 160
            }
        );
    }

    #[tokio::test]
    async fn verdict_moves_between_lists() {
        let stats = StatsTracker::new();
        let p = post("flip", "bob", &["Rust"]);
        stats.record("f", &p, DROPPED).await;
        stats.record("f", &p, KEPT).await;

        let report = &stats.report().await[0];
        assert!(report.blocked.is_empty());
        assert_eq!(report.passed.len(), 1);
        assert_eq!(report.counters, FeedCounters { passed: 1, blocked: 1 });
    }

    #[tokio::test]
    async fn report_tallies_categories_and_creators() {
        let stats = StatsTracker::new();
        stats
            .record_all(
                "f",
                [
                    (&post("a", "alice", &["Rust", "Go"]), KEPT),
                    (&post("b", "alice", &["Rust"]), KEPT),
                    (&post("c", "bob", &["iOS"]), DROPPED),
                ],
            )
            .await;

        let report = &stats.report().await[0];
        assert_eq!(
            report.passed_categories,
            vec![("Rust".to_string(), 2), ("Go".to_string(), 1)]
        );
        assert_eq!(report.passed_creators, vec![("alice".to_string(), 2)]);
        assert_eq!(report.blocked_categories, vec![("iOS".to_string(), 1)]);
        assert_eq!(report.blocked_creators, vec![("bob".to_string(), 1)]);
    }

    #[tokio::test]
    async fn recent_list_is_bounded() {
        let stats = StatsTracker::new();
        for i in 0..(MAX_RECENT_POSTS + 10) {
            stats.record("f", &post(&format!("p{i}"), "", &[]), KEPT).await;
        }

        let report = &stats.report().await[0];
        assert_eq!(report.passed.len(), MAX_RECENT_POSTS);
        assert!(!report.passed.iter().any(|p| p.title == "p0"));
        assert_eq!(report.counters.passed, (MAX_RECENT_POSTS + 10) as u64);
    }
}
