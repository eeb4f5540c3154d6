//! Tool registry and tool implementations.
//!
//! Every tool declares a name, a description for the model and a JSON input
//! schema. Server tools also carry an executor; client tools are only
//! declared here and resolved by the client (for example opening a page).
//!
//! Server tools never fail the generation: provider failures resolve to an
//! error-shaped value the model can talk about. The only `Err` a tool returns
//! is an input that does not match its schema, and that is raised before any
//! network call.

mod extract;
mod image;
mod navigate;
mod search;
mod video;
mod youtube;

pub use extract::ExtractTool;
pub use image::ImageTool;
pub use navigate::navigate_definition;
pub use search::SearchTool;
pub use video::{VideoTool, VideoToolConfig};
pub use youtube::{VideoSuggestion, YoutubeSearchTool};

use crate::config::{Credentials, Settings};
use crate::error::{ConjureError, Result};
use crate::providers::{http_client, FalClient, HttpPageFetcher, ImgbbClient, TavilyClient};
use async_openai::types::{ChatCompletionTool, ChatCompletionToolType, FunctionObject};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// What each tool is doing, as shown next to a call.
const TOOL_PURPOSES: &[(&str, &str)] = &[
    ("navigate_to_page", "Opening a page in your browser"),
    ("search", "Searching the web"),
    ("extract_url", "Reading web pages"),
    ("youtubeSearch", "Looking for videos on YouTube"),
    ("createImage", "Conjuring an image"),
    ("createVideo", "Conjuring a short video"),
];

/// Purpose line for a tool name, with a generic line for tools not listed.
pub fn tool_purpose(name: &str) -> &'static str {
    TOOL_PURPOSES
        .iter()
        .find(|(tool, _)| *tool == name)
        .map(|(_, purpose)| *purpose)
        .unwrap_or("Using a tool")
}

/// Name, description and input schema of a tool.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Function tool declaration for the chat completions API.
    pub fn to_openai(&self) -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: self.name.clone(),
                description: Some(self.description.clone()),
                parameters: Some(self.parameters.clone()),
                strict: None,
            },
        }
    }
}

/// A tool executed on the server.
#[async_trait]
pub trait ServerTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool. Returns `Err` only when `input` fails validation.
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// A tool as held by the registry.
#[derive(Clone)]
pub enum RegisteredTool {
    /// Declared only; the client performs the side effect.
    Client(ToolDefinition),
    Server(Arc<dyn ServerTool>),
}

impl RegisteredTool {
    pub fn name(&self) -> String {
        match self {
            RegisteredTool::Client(def) => def.name.clone(),
            RegisteredTool::Server(tool) => tool.definition().name,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        match self {
            RegisteredTool::Client(def) => def.clone(),
            RegisteredTool::Server(tool) => tool.definition(),
        }
    }
}

/// Outcome of dispatching a tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolDispatch {
    /// Server tool ran; the value may itself be error-shaped.
    Output(Value),
    /// Input was rejected at the schema boundary.
    InvalidInput(String),
    /// No server execution; the client resolves the call.
    ClientResolved,
    Unknown,
}

/// The set of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the standard tool set against the configured providers.
    pub fn standard(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let providers = &settings.providers;
        let http = http_client(Duration::from_secs(providers.timeout_secs))?;

        let tavily = Arc::new(TavilyClient::new(
            http.clone(),
            &providers.tavily_base_url,
            &credentials.tavily,
        ));
        let fal = Arc::new(FalClient::new(http.clone(), providers, &credentials.fal));
        let imgbb = Arc::new(ImgbbClient::new(
            http.clone(),
            &providers.imgbb_base_url,
            &credentials.imgbb,
        ));
        let fetcher = Arc::new(HttpPageFetcher::new(http));

        Ok(Self::new()
            .with_client_tool(navigate_definition())
            .with_server_tool(Arc::new(YoutubeSearchTool::new(
                fetcher,
                &providers.youtube_base_url,
            )))
            .with_server_tool(Arc::new(ImageTool::new(
                fal.clone(),
                imgbb,
                providers.image_expiration_secs,
            )))
            .with_server_tool(Arc::new(VideoTool::new(
                fal,
                VideoToolConfig::from(&settings.video),
            )))
            .with_server_tool(Arc::new(SearchTool::new(tavily.clone())))
            .with_server_tool(Arc::new(ExtractTool::new(tavily))))
    }

    pub fn with_client_tool(mut self, definition: ToolDefinition) -> Self {
        self.tools.push(RegisteredTool::Client(definition));
        self
    }

    pub fn with_server_tool(mut self, tool: Arc<dyn ServerTool>) -> Self {
        self.tools.push(RegisteredTool::Server(tool));
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(RegisteredTool::definition).collect()
    }

    /// Tool declarations for the chat completions API.
    pub fn openai_tools(&self) -> Vec<ChatCompletionTool> {
        self.definitions().iter().map(ToolDefinition::to_openai).collect()
    }

    pub fn is_client_resolved(&self, name: &str) -> bool {
        matches!(self.get(name), Some(RegisteredTool::Client(_)))
    }

    /// Run a tool call by name.
    pub async fn dispatch(&self, name: &str, input: Value) -> ToolDispatch {
        match self.get(name) {
            None => {
                warn!("Model called unknown tool: {}", name);
                ToolDispatch::Unknown
            }
            Some(RegisteredTool::Client(_)) => ToolDispatch::ClientResolved,
            Some(RegisteredTool::Server(tool)) => {
                info!("Calling tool: {} with args: {}", name, input);
                match tool.execute(input).await {
                    Ok(output) => ToolDispatch::Output(output),
                    Err(e) => ToolDispatch::InvalidInput(e.to_string()),
                }
            }
        }
    }
}

/// Deserialize tool input, mapping failures to [`ConjureError::InvalidInput`].
pub(crate) fn parse_input<T: DeserializeOwned>(tool: &str, input: Value) -> Result<T> {
    serde_json::from_value(input)
        .map_err(|e| ConjureError::InvalidInput(format!("{}: {}", tool, e)))
}

/// The `{error}` shape returned to the model on provider failure.
pub(crate) fn error_value(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ServerTool for EchoTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(
                "echo",
                "Echo the text back",
                json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]}),
            )
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            #[derive(serde::Deserialize)]
            struct Input {
                text: String,
            }
            let input: Input = parse_input("echo", input)?;
            Ok(json!({ "echo": input.text }))
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new()
            .with_client_tool(navigate_definition())
            .with_server_tool(Arc::new(EchoTool))
    }

    #[tokio::test]
    async fn test_dispatch_server_tool() {
        let outcome = registry().dispatch("echo", json!({"text": "hi"})).await;
        assert_eq!(outcome, ToolDispatch::Output(json!({"echo": "hi"})));
    }

    #[tokio::test]
    async fn test_dispatch_rejects_invalid_input() {
        let outcome = registry().dispatch("echo", json!({"words": 3})).await;
        match outcome {
            ToolDispatch::InvalidInput(msg) => assert!(msg.contains("echo")),
            other => panic!("Expected InvalidInput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_client_and_unknown() {
        let registry = registry();
        assert_eq!(
            registry.dispatch("navigate_to_page", json!({"url": "https://x"})).await,
            ToolDispatch::ClientResolved
        );
        assert_eq!(registry.dispatch("fly", json!({})).await, ToolDispatch::Unknown);
        assert!(registry.is_client_resolved("navigate_to_page"));
        assert!(!registry.is_client_resolved("echo"));
    }

    #[test]
    fn test_openai_tools_carry_schema() {
        let tools = registry().openai_tools();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[1].function.name, "echo");
        assert_eq!(
            tools[1].function.parameters.as_ref().unwrap()["required"],
            json!(["text"])
        );
    }

    #[test]
    fn test_standard_registry_names() {
        let creds = Credentials {
            model: "m".to_string(),
            fal: "f".to_string(),
            tavily: "t".to_string(),
            imgbb: "i".to_string(),
        };
        let registry = ToolRegistry::standard(&Settings::default(), &creds).unwrap();
        let mut names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "createImage",
                "createVideo",
                "extract_url",
                "navigate_to_page",
                "search",
                "youtubeSearch"
            ]
        );

        for name in names {
            assert_ne!(tool_purpose(&name), "Using a tool", "{} has no purpose line", name);
        }
    }

    #[test]
    fn test_unknown_tool_purpose() {
        assert_eq!(tool_purpose("fly"), "Using a tool");
        assert_eq!(tool_purpose("search"), "Searching the web");
    }
}
