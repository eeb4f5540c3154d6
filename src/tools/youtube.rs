//! Video search by scraping the YouTube results page.
//!
//! The results page embeds its data as `var ytInitialData = {...};` inside a
//! script tag. The shape of that blob is owned by YouTube and unversioned, so
//! anything unexpected is reported as an error rather than partial results.

use super::{error_value, parse_input, ServerTool, ToolDefinition};
use crate::error::{ConjureError, Result};
use crate::providers::PageFetcher;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Most suggestions returned per search.
const MAX_SUGGESTIONS: usize = 5;

/// One video found by a search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSuggestion {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub duration: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct YoutubeSearchInput {
    query: String,
}

/// Searches YouTube and returns up to five video suggestions.
pub struct YoutubeSearchTool {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
    initial_data_regex: Regex,
}

impl YoutubeSearchTool {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: &str) -> Self {
        let initial_data_regex =
            Regex::new(r"(?s)var ytInitialData = (.*?);\s*</script>").expect("Invalid regex");

        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            initial_data_regex,
        }
    }

    fn results_url(&self, query: &str) -> Result<String> {
        let url = url::Url::parse_with_params(
            &format!("{}/results", self.base_url),
            &[("search_query", query)],
        )
        .map_err(|e| ConjureError::Config(format!("Invalid YouTube base url: {}", e)))?;
        Ok(url.into())
    }

    /// Parse suggestions out of a results page.
    pub fn parse_page(&self, html: &str) -> Result<Vec<VideoSuggestion>> {
        let blob = self
            .initial_data_regex
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| ConjureError::Provider("Failed to parse YouTube page".to_string()))?;

        let data: Value = serde_json::from_str(blob.as_str())
            .map_err(|e| ConjureError::Provider(format!("Invalid ytInitialData: {}", e)))?;

        Ok(collect_suggestions(&data))
    }

    async fn search(&self, query: &str) -> Result<Vec<VideoSuggestion>> {
        let url = self.results_url(query)?;
        let html = self.fetcher.fetch_text(&url).await?;
        self.parse_page(&html)
    }
}

/// Walk the search renderer tree, keeping videos that have an id, title and channel.
fn collect_suggestions(data: &Value) -> Vec<VideoSuggestion> {
    let sections = data
        .pointer("/contents/twoColumnSearchResultsRenderer/primaryContents/sectionListRenderer/contents")
        .and_then(Value::as_array);

    let mut suggestions = Vec::new();
    for section in sections.into_iter().flatten() {
        let items = section
            .pointer("/itemSectionRenderer/contents")
            .and_then(Value::as_array);

        for item in items.into_iter().flatten() {
            let video = &item["videoRenderer"];
            let id = video["videoId"].as_str();
            let title = video.pointer("/title/runs/0/text").and_then(Value::as_str);
            let channel = video.pointer("/ownerText/runs/0/text").and_then(Value::as_str);

            if let (Some(id), Some(title), Some(channel)) = (id, title, channel) {
                suggestions.push(VideoSuggestion {
                    video_id: id.to_string(),
                    title: title.to_string(),
                    channel: channel.to_string(),
                    duration: video
                        .pointer("/lengthText/simpleText")
                        .and_then(Value::as_str)
                        .unwrap_or("Live/Unknown")
                        .to_string(),
                    url: format!("https://www.youtube.com/watch?v={}", id),
                });
                if suggestions.len() == MAX_SUGGESTIONS {
                    return suggestions;
                }
            }
        }
    }
    suggestions
}

#[async_trait]
impl ServerTool for YoutubeSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "youtubeSearch",
            "Search YouTube for videos on any topic",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query to find videos on YouTube"}
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: YoutubeSearchInput = parse_input("youtubeSearch", input)?;

        match self.search(&input.query).await {
            Ok(suggestions) => Ok(json!({ "videoSuggestions": suggestions })),
            Err(e) => {
                warn!("Error fetching video suggestions: {}", e);
                Ok(error_value(format!("Failed to fetch video suggestions: {}", e)))
            }
        }
    }
}
