//! Tavily search and extraction client.

use super::{ensure_success, ExtractedPage, RawContentFormat, SearchOptions, SearchProvider};
use crate::error::{ConjureError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

/// HTTP client for the Tavily API.
pub struct TavilyClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TavilyClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// Build the Tavily search body. Tool inputs use camelCase and a string
/// `"false"` for raw content; Tavily wants snake_case and a boolean.
pub(crate) fn search_body(query: &str, options: &SearchOptions) -> Value {
    let mut body = Map::new();
    body.insert("query".to_string(), json!(query));

    let camel = serde_json::to_value(options).unwrap_or_default();
    if let Value::Object(fields) = camel {
        for (key, value) in fields {
            body.insert(snake_case(&key), value);
        }
    }

    if let Some(format) = options.include_raw_content {
        let value = match format {
            RawContentFormat::Exclude => json!(false),
            RawContentFormat::Markdown => json!("markdown"),
            RawContentFormat::Text => json!("text"),
        };
        body.insert("include_raw_content".to_string(), value);
    }

    Value::Object(body)
}

fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    results: Vec<ExtractResult>,
}

#[derive(Deserialize)]
struct ExtractResult {
    url: String,
    #[serde(default)]
    raw_content: Option<String>,
}

#[async_trait]
impl SearchProvider for TavilyClient {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Value> {
        debug!("Tavily search: {}", query);

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&search_body(query, options))
            .send()
            .await?;

        let response = ensure_success(response, "Tavily search").await?;
        Ok(response.json().await?)
    }

    async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>> {
        debug!("Tavily extract: {} urls", urls.len());

        let response = self
            .http
            .post(format!("{}/extract", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({ "urls": urls }))
            .send()
            .await?;

        let response = ensure_success(response, "Tavily extract").await?;
        let parsed: ExtractResponse = response
            .json()
            .await
            .map_err(|e| ConjureError::Provider(format!("Invalid extract response: {}", e)))?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| ExtractedPage {
                url: r.url,
                raw_content: r.raw_content.unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{SearchTopic, TimeRange};

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("includeImageDescriptions"), "include_image_descriptions");
        assert_eq!(snake_case("days"), "days");
    }

    #[test]
    fn test_search_body_normalizes_options() {
        let options = SearchOptions {
            topic: Some(SearchTopic::News),
            time_range: Some(TimeRange::Month),
            max_results: Some(3),
            include_raw_content: Some(RawContentFormat::Exclude),
            include_domains: Some(vec!["wikipedia.org".to_string()]),
            ..Default::default()
        };

        let body = search_body("owls", &options);
        assert_eq!(body["query"], "owls");
        assert_eq!(body["topic"], "news");
        assert_eq!(body["time_range"], "month");
        assert_eq!(body["max_results"], 3);
        assert_eq!(body["include_raw_content"], json!(false));
        assert_eq!(body["include_domains"], json!(["wikipedia.org"]));
        assert!(body.get("search_depth").is_none());
    }

    #[test]
    fn test_search_body_keeps_markdown_format() {
        let options = SearchOptions {
            include_raw_content: Some(RawContentFormat::Markdown),
            ..Default::default()
        };
        assert_eq!(search_body("q", &options)["include_raw_content"], "markdown");
    }
}
