pub mod cache;
pub mod config;
pub mod fetcher;
pub mod filter;
pub mod html;
pub mod merge;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod server;
pub mod stats;
pub mod traits;
pub mod types;
pub mod writer;

pub use cache::FeedCache;
pub use crate::config::{AppConfig, FeedConfig, FeedRegistry};
pub use fetcher::Fetcher;
pub use filter::{FilterSpec, Reason, Verdict};
pub use merge::merge_and_dedup;
pub use parser::FeedParser;
pub use pipeline::{BuiltFeed, FeedPipeline};
pub use rules::{Field, Rule};
pub use stats::StatsTracker;
pub use traits::FeedSource;
pub use types::*;
pub use writer::FeedWriter;
