use chrono::{DateTime, Utc};

/// A single normalized feed entry.
///
/// Built by the parser from upstream bytes and never mutated afterwards;
/// the pipeline shares posts between the cache and the response via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Dedup key: the upstream guid when present, otherwise the normalized link.
    pub identity: String,
    pub guid: Option<String>,
    pub title: String,
    pub link: String,
    pub description: Option<String>,
    pub creator: String,
    pub categories: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Validators returned by an upstream server, replayed on the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// What a [`crate::traits::FeedSource`] hands back for one URL.
#[derive(Debug, Clone)]
pub enum FetchedBody {
    Modified { body: Vec<u8>, validators: Validators },
    NotModified,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "rss-filter/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 1,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

/// Failure to obtain an upstream feed.
///
/// Cloneable so one coalesced fetch can report the same failure to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to fetch {url}: {message}")]
pub struct FetchError {
    pub url: String,
    pub message: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("feed name must not be empty")]
    EmptyName,

    #[error("duplicate feed name: {name}")]
    DuplicateFeed { name: String },

    #[error("feed {feed} has no upstream urls")]
    NoUrls { feed: String },

    #[error("feed {feed} has invalid url {url}: {reason}")]
    InvalidUrl {
        feed: String,
        url: String,
        reason: String,
    },

    #[error("feed {feed} has invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        feed: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("feed {feed} has a filter entry without title, creator or category")]
    EmptyFilter { feed: String },

    #[error("cache_max_age_secs must be positive")]
    ZeroMaxAge,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Feed not found: {name}")]
    UnknownFeed { name: String },

    #[error("Feed encoding error: {0}")]
    Codec(String),
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
