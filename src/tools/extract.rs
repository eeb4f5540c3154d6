//! URL content extraction tool.

use super::{parse_input, ServerTool, ToolDefinition};
use crate::error::{ConjureError, Result};
use crate::providers::SearchProvider;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

/// Most URLs accepted in one call.
pub const MAX_URLS: usize = 20;

#[derive(Debug, Deserialize)]
struct ExtractInput {
    urls: Vec<String>,
}

impl ExtractInput {
    fn validate(&self) -> Result<()> {
        if self.urls.len() > MAX_URLS {
            return Err(ConjureError::InvalidInput(format!(
                "extract_url: at most {} urls are allowed, got {}",
                MAX_URLS,
                self.urls.len()
            )));
        }
        for raw in &self.urls {
            url::Url::parse(raw).map_err(|e| {
                ConjureError::InvalidInput(format!("extract_url: invalid url {:?}: {}", raw, e))
            })?;
        }
        Ok(())
    }
}

/// Extracts raw page content through the search provider.
///
/// Failure is all-or-nothing: an empty result list plus a top-level error.
pub struct ExtractTool {
    provider: Arc<dyn SearchProvider>,
}

impl ExtractTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ServerTool for ExtractTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "extract_url",
            "Extract content and optionally images from a list of URLs",
            json!({
                "type": "object",
                "properties": {
                    "urls": {
                        "type": "array",
                        "items": {"type": "string", "format": "uri"},
                        "maxItems": MAX_URLS,
                        "description": "List of URLs to extract content from (maximum 20 URLs)"
                    }
                },
                "required": ["urls"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: ExtractInput = parse_input("extract_url", input)?;
        input.validate()?;

        match self.provider.extract(&input.urls).await {
            Ok(pages) => Ok(json!({ "results": pages })),
            Err(e) => {
                warn!("Extraction failed: {}", e);
                Ok(json!({ "results": [], "error": e.to_string() }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ExtractedPage, SearchOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeExtract {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for FakeExtract {
        async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<Value> {
            unreachable!("extract tool never searches")
        }

        async fn extract(&self, urls: &[String]) -> Result<Vec<ExtractedPage>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConjureError::Provider("Tavily extract failed: 500".to_string()));
            }
            Ok(urls
                .iter()
                .map(|u| ExtractedPage {
                    url: u.clone(),
                    raw_content: format!("content of {}", u),
                })
                .collect())
        }
    }

    fn urls(n: usize) -> Value {
        json!((0..n).map(|i| format!("https://example.com/{}", i)).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_extract_returns_raw_content() {
        let provider = Arc::new(FakeExtract::default());
        let tool = ExtractTool::new(provider);

        let output = tool.execute(json!({ "urls": urls(2) })).await.unwrap();
        assert_eq!(output["results"][1]["url"], "https://example.com/1");
        assert_eq!(output["results"][1]["rawContent"], "content of https://example.com/1");
        assert!(output.get("error").is_none());
    }

    #[tokio::test]
    async fn test_more_than_twenty_urls_rejected_without_network() {
        let provider = Arc::new(FakeExtract::default());
        let tool = ExtractTool::new(provider.clone());

        let err = tool.execute(json!({ "urls": urls(21) })).await.unwrap_err();
        assert!(matches!(err, ConjureError::InvalidInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        assert!(tool.execute(json!({ "urls": urls(20) })).await.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_url_rejected() {
        let provider = Arc::new(FakeExtract::default());
        let tool = ExtractTool::new(provider.clone());

        let err = tool
            .execute(json!({ "urls": ["not a url"] }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid url"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_is_empty_list_with_error() {
        let provider = Arc::new(FakeExtract {
            fail: true,
            ..Default::default()
        });
        let tool = ExtractTool::new(provider);

        let output = tool.execute(json!({ "urls": urls(3) })).await.unwrap();
        assert_eq!(output["results"], json!([]));
        assert!(output["error"].as_str().unwrap().contains("500"));
    }
}
