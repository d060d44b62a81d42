//! Calendar page retrieval and availability extraction.

use async_trait::async_trait;

use crate::feed::error::FeedError;

pub mod calendar_page;
pub mod error;
pub mod extractor;

/// Source of the raw calendar markup.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetches the page body. Never retries; the next poll is the retry.
    async fn fetch_page(&self) -> Result<String, FeedError>;

    /// The URL this source reads, used in logs and alert messages.
    fn page_url(&self) -> &str;
}
