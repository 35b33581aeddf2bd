use crate::types::{FetchError, FetchedBody, Validators};
use async_trait::async_trait;

/// Something that can retrieve the raw bytes of an upstream feed.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch `url`, replaying `validators` from the previous successful fetch.
    ///
    /// Connectivity problems, timeouts and non-2xx responses are all
    /// reported as [`FetchError`].
    async fn fetch(&self, url: &str, validators: &Validators) -> Result<FetchedBody, FetchError>;
}
