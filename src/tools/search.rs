//! Web search tool.

use super::{error_value, parse_input, ServerTool, ToolDefinition};
use crate::error::Result;
use crate::providers::{SearchOptions, SearchProvider};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(flatten)]
    options: SearchOptions,
}

/// Forwards a query and its options to the search provider.
pub struct SearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl SearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ServerTool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search",
            "Perform a comprehensive web search and get detailed results including optional images and AI-generated answers",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "The search query to find information about"},
                    "searchDepth": {"type": "string", "enum": ["basic", "advanced"], "description": "Depth of search - basic is faster, advanced is more thorough"},
                    "topic": {"type": "string", "enum": ["general", "news"], "description": "Category of search - general for broad searches, news for recent events"},
                    "days": {"type": "integer", "description": "Number of days back to search (only works with news topic, defaults to 3)"},
                    "timeRange": {"type": "string", "enum": ["day", "week", "month", "year", "d", "w", "m", "y"], "description": "Time range for results - alternative to days parameter"},
                    "maxResults": {"type": "integer", "description": "Maximum number of results to return (default: 5)"},
                    "includeImages": {"type": "boolean", "description": "Include related images in the response"},
                    "includeImageDescriptions": {"type": "boolean", "description": "Add descriptive text for each image (requires includeImages)"},
                    "includeAnswer": {"type": "boolean", "description": "Include an AI-generated answer to the query"},
                    "includeRawContent": {"type": "string", "enum": ["false", "markdown", "text"], "description": "Include raw content in the specified format: \"false\" to exclude, \"markdown\" or \"text\" for content format"},
                    "includeDomains": {"type": "array", "items": {"type": "string"}, "description": "List of domains to specifically include in results"},
                    "excludeDomains": {"type": "array", "items": {"type": "string"}, "description": "List of domains to exclude from results"}
                },
                "required": ["query"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: SearchInput = parse_input("search", input)?;

        match self.provider.search(&input.query, &input.options).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!("Search failed: {}", e);
                Ok(error_value(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConjureError;
    use crate::providers::{ExtractedPage, SearchTopic};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSearch {
        fail: bool,
        seen: Mutex<Vec<(String, SearchOptions)>>,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str, options: &SearchOptions) -> Result<Value> {
            self.seen
                .lock()
                .unwrap()
                .push((query.to_string(), options.clone()));
            if self.fail {
                return Err(ConjureError::Provider("Tavily search failed: 432".to_string()));
            }
            Ok(json!({"query": query, "results": [{"title": "Owls", "url": "https://owls.example"}]}))
        }

        async fn extract(&self, _urls: &[String]) -> Result<Vec<ExtractedPage>> {
            unreachable!("search tool never extracts")
        }
    }

    #[tokio::test]
    async fn test_search_forwards_options() {
        let provider = Arc::new(FakeSearch::default());
        let tool = SearchTool::new(provider.clone());

        let output = tool
            .execute(json!({"query": "owl post", "topic": "news", "maxResults": 2}))
            .await
            .unwrap();

        assert_eq!(output["results"][0]["title"], "Owls");
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].0, "owl post");
        assert_eq!(seen[0].1.topic, Some(SearchTopic::News));
        assert_eq!(seen[0].1.max_results, Some(2));
    }

    #[tokio::test]
    async fn test_provider_failure_resolves_to_error_value() {
        let provider = Arc::new(FakeSearch {
            fail: true,
            ..Default::default()
        });
        let tool = SearchTool::new(provider);

        let output = tool.execute(json!({"query": "owl post"})).await.unwrap();
        assert!(output["error"].as_str().unwrap().contains("432"));
        assert!(output.get("results").is_none());
    }

    #[tokio::test]
    async fn test_whole_float_counts_accepted() {
        let provider = Arc::new(FakeSearch::default());
        let tool = SearchTool::new(provider.clone());

        tool.execute(json!({"query": "owls", "maxResults": 5.0, "days": 7}))
            .await
            .unwrap();

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].1.max_results, Some(5));
        assert_eq!(seen[0].1.days, Some(7));
    }

    #[tokio::test]
    async fn test_fractional_count_rejected_before_provider() {
        let provider = Arc::new(FakeSearch::default());
        let tool = SearchTool::new(provider.clone());

        for bad in [json!(2.5), json!(-1)] {
            let err = tool
                .execute(json!({"query": "owls", "maxResults": bad}))
                .await
                .unwrap_err();
            assert!(matches!(err, ConjureError::InvalidInput(_)));
        }
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_counts_declared_as_integers() {
        let tool = SearchTool::new(Arc::new(FakeSearch::default()));
        let schema = tool.definition().parameters;
        assert_eq!(schema["properties"]["maxResults"]["type"], "integer");
        assert_eq!(schema["properties"]["days"]["type"], "integer");
    }

    #[tokio::test]
    async fn test_bad_enum_rejected_before_provider() {
        let provider = Arc::new(FakeSearch::default());
        let tool = SearchTool::new(provider.clone());

        let err = tool
            .execute(json!({"query": "q", "searchDepth": "deepest"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConjureError::InvalidInput(_)));
        assert!(provider.seen.lock().unwrap().is_empty());
    }
}
