//! External providers behind the server-side tools.
//!
//! Each provider is a trait so tools can be exercised without the network;
//! the HTTP implementations live in the submodules.

mod fal;
mod imgbb;
mod tavily;
mod web;

pub use fal::FalClient;
pub use imgbb::ImgbbClient;
pub use tavily::TavilyClient;
pub use web::HttpPageFetcher;

use crate::error::{ConjureError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Build the shared HTTP client used by provider implementations.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turn a non-success HTTP response into a provider error that names the call.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let reason = status.canonical_reason().unwrap_or("");
    let mut message = format!("{} failed: {} {}", what, status.as_u16(), reason);
    if !body.trim().is_empty() {
        message.push_str(&format!(" ({})", body.chars().take(300).collect::<String>()));
    }
    Err(ConjureError::Provider(message.trim_end().to_string()))
}

/// Raw content format requested from the search provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RawContentFormat {
    #[serde(rename = "false")]
    Exclude,
    #[serde(rename = "markdown")]
    Markdown,
    #[serde(rename = "text")]
    Text,
}

/// Optional knobs for a web search.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_depth: Option<SearchDepth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<SearchTopic>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(
        default,
        deserialize_with = "whole_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_image_descriptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_answer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_raw_content: Option<RawContentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_domains: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_domains: Option<Vec<String>>,
}

/// Accept `5` and `5.0` alike; reject fractions, negatives and overflow.
fn whole_number<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let Some(value) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if value.fract() != 0.0 || value < 0.0 || value > f64::from(u32::MAX) {
        return Err(D::Error::custom(format!(
            "expected a non-negative whole number, got {}",
            value
        )));
    }
    Ok(Some(value as u32))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchTopic {
    General,
    News,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimeRange {
    #[serde(rename = "day", alias = "d")]
    Day,
    #[serde(rename = "week", alias = "w")]
    Week,
    #[serde(rename = "month", alias = "m")]
    Month,
    #[serde(rename = "year", alias = "y")]
    Year,
}

/// Content extracted from one URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPage {
    pub url: String,
    #[serde(rename = "rawContent")]
    pub raw_content: String,
}

/// Web search and content extraction.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a search and return the provider's response document.
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Value>;

    /// Extract raw content from a list of URLs.
    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>>;
}

/// An image produced by a synthesis provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    /// Base64-encoded image bytes.
    pub base64: String,
    pub media_type: String,
}

/// Text-to-image synthesis.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<GeneratedImage>;
}

/// An image stored by a hosting provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostedImage {
    pub id: String,
    pub title: String,
    pub url: String,
    pub size: u64,
}

/// Temporary image hosting.
#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload base64 image data that expires after `expiration_secs`.
    async fn upload(&self, base64: &str, expiration_secs: u64) -> Result<HostedImage>;
}

/// State of a queued generation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    InQueue,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

/// Status document returned by a job poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Queue-based generation API: submit, poll by request id, fetch result.
#[async_trait]
pub trait GenerationQueue: Send + Sync {
    /// Submit a job. The response is either a queued descriptor
    /// (`status` + `request_id`) or an inline result.
    async fn submit(&self, body: &Value) -> Result<Value>;

    async fn status(&self, request_id: &str) -> Result<JobStatus>;

    async fn result(&self, request_id: &str) -> Result<Value>;
}

/// Fetches a page as text.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}
