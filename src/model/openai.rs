//! OpenAI-compatible chat completions provider.

use super::{ModelDelta, ModelProvider, ModelRequest, ModelStream};
use crate::config::ModelSettings;
use crate::error::{ConjureError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatChoiceStream, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// Create a client for an OpenAI-compatible API with the configured base URL and timeout.
pub fn create_client(settings: &ModelSettings, api_key: &str) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let config = OpenAIConfig::new()
        .with_api_base(settings.api_base.trim_end_matches('/'))
        .with_api_key(api_key);

    Ok(Client::with_config(config).with_http_client(http_client))
}

/// Streaming chat model backed by `async-openai`.
pub struct OpenAiModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiModel {
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// Build a model from settings and an API key.
    pub fn from_settings(settings: &ModelSettings, api_key: &str) -> Result<Self> {
        Ok(Self::new(create_client(settings, api_key)?, &settings.model))
    }
}

#[async_trait]
impl ModelProvider for OpenAiModel {
    async fn stream(&self, request: ModelRequest) -> Result<ModelStream> {
        let mut messages: Vec<ChatCompletionRequestMessage> =
            Vec::with_capacity(request.messages.len() + 1);
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system)
                .build()
                .map_err(|e| ConjureError::Model(e.to_string()))?
                .into(),
        );
        messages.extend(request.messages);

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(messages)
            .max_completion_tokens(request.max_output_tokens);
        if !request.tools.is_empty() {
            args.tools(request.tools);
        }
        let chat_request = args
            .build()
            .map_err(|e| ConjureError::Model(e.to_string()))?;

        debug!("Opening model stream with {}", self.model);

        let stream = self
            .client
            .chat()
            .create_stream(chat_request)
            .await
            .map_err(|e| ConjureError::Model(e.to_string()))?;

        let deltas = stream.flat_map(|item| {
            let batch: Vec<Result<ModelDelta>> = match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .flat_map(choice_deltas)
                    .map(Ok)
                    .collect(),
                Err(e) => vec![Err(ConjureError::Model(e.to_string()))],
            };
            futures::stream::iter(batch)
        });

        Ok(deltas.boxed())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Flatten one streamed choice into deltas.
fn choice_deltas(choice: ChatChoiceStream) -> Vec<ModelDelta> {
    let mut deltas = Vec::new();

    if let Some(content) = choice.delta.content {
        if !content.is_empty() {
            deltas.push(ModelDelta::Text(content));
        }
    }

    for chunk in choice.delta.tool_calls.unwrap_or_default() {
        let (name, arguments) = match chunk.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        deltas.push(ModelDelta::ToolCallChunk {
            index: chunk.index,
            id: chunk.id,
            name,
            arguments,
        });
    }

    deltas
}
