use crate::traits::FeedSource;
use crate::types::{AggregatorError, FetchConfig, FetchError, FetchedBody, Result, Validators};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::header::{HeaderName, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// HTTP implementation of [`FeedSource`].
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(AggregatorError::Http)?;

        Ok(Self { client, config })
    }

    pub async fn fetch_feed(&self, url: &str, validators: &Validators) -> std::result::Result<FetchedBody, FetchError> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.fetch_with_conditional_headers(url, validators).await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::NOT_MODIFIED {
                        debug!("Feed not modified: {}", url);
                        return Ok(FetchedBody::NotModified);
                    }

                    if status.is_success() {
                        match self.read_body(response).await {
                            Ok((body, validators)) => {
                                info!(
                                    "Fetched feed: {} ({} bytes in {}ms)",
                                    url,
                                    body.len(),
                                    start_time.elapsed().as_millis()
                                );
                                return Ok(FetchedBody::Modified { body, validators });
                            }
                            // Oversized bodies will not shrink on retry.
                            Err(BodyError::TooLarge(size)) => {
                                error!("Feed {} exceeds size limit ({} bytes)", url, size);
                                return Err(FetchError::new(url, format!("feed too large: {} bytes", size)));
                            }
                            Err(BodyError::Read(e)) => last_error = Some(describe(&e)),
                        }
                    } else {
                        last_error = Some(format!(
                            "HTTP {}: {}",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown")
                        ));
                        // Client errors are not retried.
                        if status.is_client_error() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(describe(&e));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        let message = last_error.unwrap_or_else(|| "Unknown error".to_string());
        error!("Failed to fetch feed {}: {}", url, message);
        Err(FetchError::new(url, message))
    }

    async fn fetch_with_conditional_headers(
        &self,
        url: &str,
        validators: &Validators,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut request = self.client.get(url);

        if let Some(etag) = &validators.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        if let Some(last_modified) = &validators.last_modified {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        request.send().await
    }

    async fn read_body(&self, response: Response) -> std::result::Result<(Vec<u8>, Validators), BodyError> {
        let limit = self.config.max_feed_size_mb * 1024 * 1024;

        if let Some(content_length) = response.content_length() {
            if content_length as usize > limit {
                return Err(BodyError::TooLarge(content_length as usize));
            }
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let validators = Validators {
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        };

        let body = response.bytes().await.map_err(BodyError::Read)?;
        if body.len() > limit {
            return Err(BodyError::TooLarge(body.len()));
        }

        Ok((body.to_vec(), validators))
    }
}

enum BodyError {
    TooLarge(usize),
    Read(reqwest::Error),
}

#[async_trait]
impl FeedSource for Fetcher {
    async fn fetch(&self, url: &str, validators: &Validators) -> std::result::Result<FetchedBody, FetchError> {
        self.fetch_feed(url, validators).await
    }
}

fn describe(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
