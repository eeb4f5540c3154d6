//! Plain page fetching for scraped sources.

use super::{ensure_success, PageFetcher};
use crate::error::Result;
use async_trait::async_trait;

/// Desktop browser user agent; search result pages embed their data blob
/// only for full browsers.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Fetches pages over HTTP with a browser user agent.
pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?;
        let response = ensure_success(response, "Page fetch").await?;
        Ok(response.text().await?)
    }
}
