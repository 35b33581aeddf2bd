use crate::types::{AggregatorError, Post, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, info};
use url::Url;

/// Decodes upstream RSS/Atom bytes into [`Post`]s.
///
/// Malformed documents fail as a whole; malformed entries inside a valid
/// document are skipped so one bad item cannot take down the output feed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedParser;

#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub posts: Vec<Post>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_feed(&self, content: &[u8]) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        // An empty generated id lets us tell "no guid" apart from a real one.
        let feed = parser::Builder::new()
            .id_generator(|_, _, _| String::new())
            .build()
            .parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let title = feed.title.map(|t| t.content);
        let total = feed.entries.len();
        let posts: Vec<Post> = feed
            .entries
            .into_iter()
            .filter_map(|entry| self.parse_entry(entry))
            .collect();

        if posts.len() < total {
            debug!("Skipped {} malformed entries", total - posts.len());
        }
        info!(
            "Parsed feed \"{}\" with {} entries",
            title.as_deref().unwrap_or("untitled"),
            posts.len()
        );

        Ok(ParsedFeed { title, posts })
    }

    fn parse_entry(&self, entry: feed_rs::model::Entry) -> Option<Post> {
        let guid = Some(entry.id.trim().to_string()).filter(|id| !id.is_empty());
        let link = entry.links.first().map(|l| clean_link(&l.href));

        // Identity needs either a guid or a link.
        let (identity, link) = match (&guid, link) {
            (Some(guid), link) => (guid.clone(), link.unwrap_or_else(|| guid.clone())),
            (None, Some(link)) => (link.clone(), link),
            (None, None) => {
                debug!("Skipping entry without guid or link");
                return None;
            }
        };

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_else(|| "Untitled".to_string());

        let description = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        let creator = entry
            .authors
            .first()
            .map(|a| a.name.trim().to_string())
            .unwrap_or_default();

        let mut categories: Vec<String> = Vec::new();
        for category in entry.categories {
            let term = category.term.trim().to_string();
            if !term.is_empty() && !categories.contains(&term) {
                categories.push(term);
            }
        }

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        Some(Post {
            identity,
            guid,
            title,
            link,
            description,
            creator,
            categories,
            published_at,
        })
    }
}

/// Strips `utm_*` tracking parameters and the fragment from a link.
///
/// Links that do not parse as URLs are returned trimmed but otherwise as-is.
pub fn clean_link(link: &str) -> String {
    let link = link.trim();
    let Ok(mut url) = Url::parse(link) else {
        return link.to_string();
    };

    url.set_fragment(None);

    // Raw segments are kept byte for byte so the same link normalizes the
    // same way with or without tracking parameters.
    let kept: Vec<&str> = url
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|segment| !segment.is_empty() && !segment.starts_with("utm_"))
        .collect();
    let query = (!kept.is_empty()).then(|| kept.join("&"));
    url.set_query(query.as_deref());

    url.to_string()
}
