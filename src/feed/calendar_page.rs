//! HTTP fetcher for the CISIA calendar page.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use wreq::Client;
use wreq::header::HeaderMap;
use wreq::header::HeaderValue;
use wreq::header::USER_AGENT;

use crate::config::Config;
use crate::feed::PageSource;
use crate::feed::error::FeedError;

pub struct CalendarPage {
    client: Client,
    url: String,
    timeout: Duration,
}

impl CalendarPage {
    /// Creates a fetcher presenting itself as a desktop browser.
    pub fn new(
        url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        let agent = HeaderValue::from_str(user_agent).map_err(|e| FeedError::InvalidClient {
            message: format!("bad user agent: {e}"),
        })?;
        headers.insert(USER_AGENT, agent);

        let client = Client::builder()
            .emulation(wreq_util::Emulation::Chrome137)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FeedError> {
        Self::new(
            config.calendar_url.clone(),
            &config.user_agent,
            config.fetch_timeout,
        )
    }

    /// Fetches `url`, failing on transport errors, non-2xx statuses and
    /// when the whole exchange takes longer than `timeout`.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FeedError> {
        debug!("Making request to: {url}");
        let exchange = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(FeedError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response.text().await?)
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| FeedError::Timeout {
                url: url.to_string(),
                timeout,
            })?
    }
}

#[async_trait]
impl PageSource for CalendarPage {
    async fn fetch_page(&self) -> Result<String, FeedError> {
        self.fetch(&self.url, self.timeout).await
    }

    fn page_url(&self) -> &str {
        &self.url
    }
}
