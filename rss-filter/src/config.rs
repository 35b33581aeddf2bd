//! Configuration loading and validation.
//!
//! [`AppConfig::load`] reads a YAML file through the `config` crate and turns
//! it into an immutable [`FeedRegistry`] with every rule regex compiled up
//! front. Any problem is reported as a [`ConfigError`] before the server
//! starts listening.

use crate::filter::FilterSpec;
use crate::rules::{Field, Rule};
use crate::types::{ConfigError, FetchConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterEntry {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedEntry {
    pub name: String,
    pub urls: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<FilterEntry>,
    #[serde(default)]
    pub include: Vec<FilterEntry>,
}

/// The file as written by the user, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
    #[serde(default)]
    pub fetch: FetchConfig,
    pub feeds: Vec<FeedEntry>,
}

fn default_cache_max_age_secs() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// One output feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub urls: Vec<String>,
    pub filter: FilterSpec,
}

/// All output feeds, in file order, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: Vec<Arc<FeedConfig>>,
    by_name: HashMap<String, usize>,
}

impl FeedRegistry {
    pub fn new(feeds: Vec<FeedConfig>) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for feed in feeds {
            if registry.by_name.contains_key(&feed.name) {
                return Err(ConfigError::DuplicateFeed { name: feed.name });
            }
            registry
                .by_name
                .insert(feed.name.clone(), registry.feeds.len());
            registry.feeds.push(Arc::new(feed));
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<FeedConfig>> {
        self.by_name.get(name).map(|&idx| &self.feeds[idx])
    }

    pub fn names(&self) -> Vec<&str> {
        self.feeds.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_max_age: Duration,
    pub fetch: FetchConfig,
    pub feeds: Arc<FeedRegistry>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let raw: RawConfig = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        raw.validate()
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        raw.validate()
    }
}

impl RawConfig {
    pub fn validate(self) -> Result<AppConfig, ConfigError> {
        if self.cache_max_age_secs == 0 {
            return Err(ConfigError::ZeroMaxAge);
        }

        let feeds = self
            .feeds
            .into_iter()
            .map(FeedEntry::validate)
            .collect::<Result<Vec<_>, _>>()?;
        let registry = FeedRegistry::new(feeds)?;

        info!(
            "Configured {} output feeds: {}",
            registry.len(),
            registry.names().join(", ")
        );

        Ok(AppConfig {
            cache_max_age: Duration::from_secs(self.cache_max_age_secs),
            fetch: self.fetch,
            feeds: Arc::new(registry),
        })
    }
}

impl FeedEntry {
    fn validate(self) -> Result<FeedConfig, ConfigError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.urls.is_empty() {
            return Err(ConfigError::NoUrls { feed: name });
        }
        for url in &self.urls {
            validate_url(&name, url)?;
        }

        let exclude = compile_rules(&name, &self.exclude)?;
        let include = compile_rules(&name, &self.include)?;
        debug!(
            "Feed {}: {} urls, {} exclude rules, {} include rules",
            name,
            self.urls.len(),
            exclude.len(),
            include.len()
        );
        for rule in &exclude {
            debug!("Feed {}: exclude {}", name, rule);
        }
        for rule in &include {
            debug!("Feed {}: include {}", name, rule);
        }

        Ok(FeedConfig {
            name,
            urls: self.urls,
            filter: FilterSpec::new(exclude, include),
        })
    }
}

fn validate_url(feed: &str, url: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        feed: feed.to_string(),
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| invalid(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Every key set on a filter entry becomes one rule.
fn compile_rules(feed: &str, entries: &[FilterEntry]) -> Result<Vec<Rule>, ConfigError> {
    let mut rules = Vec::new();
    for entry in entries {
        let fields = [
            (Field::Title, &entry.title),
            (Field::Creator, &entry.creator),
            (Field::Category, &entry.category),
        ];
        let before = rules.len();
        for (field, pattern) in fields {
            if let Some(pattern) = pattern {
                rules.push(Rule::new(feed, field, pattern)?);
            }
        }
        if rules.len() == before {
            return Err(ConfigError::EmptyFilter {
                feed: feed.to_string(),
            });
        }
    }
    Ok(rules)
}
