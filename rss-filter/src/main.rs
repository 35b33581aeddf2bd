use anyhow::Context;
use clap::Parser;
use rss_filter::server::{build_router, AppState};
use rss_filter::{AppConfig, FeedCache, FeedPipeline, Fetcher, StatsTracker};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rss-filter", about = "Merges, deduplicates and filters RSS feeds")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(short = 'f', long)]
    config: PathBuf,

    /// Host to listen on.
    #[arg(short = 'l', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    let fetcher = Fetcher::new(config.fetch.clone()).context("failed to build HTTP client")?;
    let cache = FeedCache::new(Arc::new(fetcher));
    let stats = Arc::new(StatsTracker::new());
    let pipeline = FeedPipeline::new(config.feeds.clone(), cache, stats, config.cache_max_age);

    let app = build_router(AppState::new(pipeline));

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;
    info!("Serving {} feeds on http://{}", config.feeds.len(), addr);

    axum::serve(listener, app).await?;
    Ok(())
}
